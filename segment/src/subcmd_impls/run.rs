use crate::subcmd_impls::labels::class_counts;
use crate::subcmd_impls::panels::render_panels;
use crate::subcmd_impls::utils::ranges_to_indices;
use clap::Args;
use json::JsonValue;
use mri::infer::default_loader;
use mri::prelude::{
    label_histogram, segment_archive, select_model, select_slices, write_npy, CaseOutcome,
    CropWindow, ModelCache, ModelOrigin, PipelineConfig,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 进程内唯一的默认模型缓存，首次使用时确定路径。
static DEFAULT_MODEL: OnceLock<ModelCache> = OnceLock::new();

fn default_model_cache(path: &Path) -> &'static ModelCache {
    let cache = DEFAULT_MODEL.get_or_init(|| ModelCache::new(path));
    if cache.path() != path {
        log::warn!(
            "默认模型已固定为 `{}`，忽略 `{}`",
            cache.path().display(),
            path.display()
        );
    }
    cache
}

#[derive(Args, Debug)]
pub struct Run {
    /// 含四个模态NIfTI文件（可选标注）的zip压缩包。
    #[arg(long = "archive", short = 'a')]
    archive: PathBuf,
    /// 自定义模型文件。加载失败时回退到默认模型。
    #[arg(long = "model", short = 'm')]
    model: Option<PathBuf>,
    /// 默认模型文件。
    #[arg(
        long = "default-model",
        env = "SEGMENTER_DEFAULT_MODEL",
        default_value = "default_model.onnx"
    )]
    default_model: PathBuf,
    /// 输出目录。
    #[arg(long = "output-dir", short = 'o', default_value = ".")]
    out_dir: PathBuf,
    /// 可视化的深度切片，如`75,90,100`或`80-82`。
    #[arg(long, value_parser = ranges_to_indices, default_value = "75,90,100")]
    slices: BTreeSet<usize>,
    /// 不生成`panels.png`。
    #[arg(long)]
    no_panels: bool,
    /// 额外保存组合体数据与预测结果的npy文件。
    #[arg(long)]
    save_npy: bool,
    /// 额外保存`report.json`。
    #[arg(long)]
    report: bool,
}

impl Run {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [archive.zip] -> [output-dir/{segmentation_result.nii.gz, panels.png, *.npy, report.json}]
        let config = PipelineConfig {
            window: CropWindow::default(),
            preview_slices: self.slices.iter().copied().collect(),
        };
        if !self.no_panels {
            config.check_preview_slices()?;
        }
        fs::create_dir_all(self.out_dir.as_path())?;

        let loader = default_loader();
        let cache = default_model_cache(self.default_model.as_path());
        let selected = select_model(cache, self.model.as_deref(), loader.as_ref())?;
        log::info!("模型来源: {}", selected.origin);

        let mut outcome = segment_archive(self.archive.as_path(), selected.model.as_ref(), &config)?;
        let result = outcome.deliver(self.out_dir.as_path())?;
        println!("{}", result.display());

        if !self.no_panels {
            let views = select_slices(
                &outcome.combined,
                outcome.ground_truth.as_ref(),
                &outcome.prediction,
                &config.preview_slices,
            )?;
            let path = self.out_dir.join("panels.png");
            render_panels(&views)?.save(path.as_path())?;
            log::info!("可视化面板已保存至 `{}`", path.display());
        }
        if self.save_npy {
            write_npy(self.out_dir.join("combined.npy"), &outcome.combined)?;
            write_npy(self.out_dir.join("prediction.npy"), &outcome.prediction)?;
        }
        if self.report {
            let path = self.out_dir.join("report.json");
            fs::write(path.as_path(), build_report(&outcome, &selected.origin).pretty(2))?;
            log::info!("报告已保存至 `{}`", path.display());
        }
        Ok(())
    }
}

fn build_report(outcome: &CaseOutcome, origin: &ModelOrigin) -> JsonValue {
    let mut report = JsonValue::new_object();
    report["input_shape"] = outcome.input_shape.clone().into();
    report["combined_shape"] = outcome.combined.shape().to_vec().into();
    report["model_origin"] = origin.to_string().into();
    let prediction = label_histogram(&outcome.prediction);
    report["prediction_classes"] = class_counts(&prediction);
    report["prediction_counts"] = prediction.into();
    report["ground_truth_counts"] = match outcome.ground_truth {
        Some(ref gt) => label_histogram(gt).into(),
        None => JsonValue::Null,
    };
    let mut timings = JsonValue::new_object();
    for (stage, ms) in outcome.timings.iter() {
        timings[stage.to_string().as_str()] = (*ms).into();
    }
    report["timings_ms"] = timings;
    report
}
