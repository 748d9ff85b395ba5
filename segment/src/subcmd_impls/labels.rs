use clap::Args;
use json::JsonValue;
use mri::pipeline::load_ground_truth;
use mri::prelude::{class_name, label_histogram, CropWindow, LabelVolume};
use mri::prep::{adapt_ground_truth, load_volume};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Labels {
    /// 标注文件（`*seg.nii.gz`）。
    #[arg(long = "input", short)]
    input: PathBuf,
    /// 先按默认窗口裁剪，与预测结果对齐。
    #[arg(long)]
    crop: bool,
}

impl Labels {
    pub fn run(&mut self) -> anyhow::Result<()> {
        let labels = if self.crop {
            load_ground_truth(self.input.as_path(), &CropWindow::default())?
        } else {
            adapt_ground_truth(load_volume(self.input.as_path())?)?
        };
        println!("{}", histogram_json(&labels).pretty(2));
        Ok(())
    }
}

/// `{"shape": [...], "counts": [...], "classes": {...}}`
pub fn histogram_json(labels: &LabelVolume) -> JsonValue {
    let counts = label_histogram(labels);
    let mut obj = JsonValue::new_object();
    obj["shape"] = labels.shape().to_vec().into();
    obj["classes"] = class_counts(&counts);
    obj["counts"] = counts.into();
    obj
}

/// 以类别名称为键的体素数。
pub fn class_counts(counts: &[usize]) -> JsonValue {
    let mut obj = JsonValue::new_object();
    for (label, &n) in counts.iter().enumerate() {
        let name = match u8::try_from(label) {
            Ok(l) if class_name(l) != "unknown" => class_name(l).to_string(),
            _ => format!("label_{label}"),
        };
        obj[name.as_str()] = n.into();
    }
    obj
}
