use clap::Args;
use mri::pipeline::{load_modalities, locate_case_files, preprocess_volumes};
use mri::prelude::{write_npy, CropWindow};
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Combine {
    /// 含四个模态NIfTI文件的目录（递归查找）。
    #[arg(long = "input-dir", short)]
    in_dir: PathBuf,
    /// 输出的npy文件。
    #[arg(long = "output", short)]
    out_file: PathBuf,
}

impl Combine {
    pub fn run(&mut self) -> anyhow::Result<()> {
        // [input-dir/**/*-{t1n,t1c,t2f,t2w}.nii.gz] -> [output.npy]
        anyhow::ensure!(
            self.in_dir.is_dir(),
            "`{}` is not a directory",
            self.in_dir.display()
        );
        if let Some(parent) = self.out_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let files = locate_case_files(self.in_dir.as_path())?;
        let combined = preprocess_volumes(load_modalities(&files)?, &CropWindow::default())?;
        write_npy(self.out_file.as_path(), &combined)?;
        log::info!(
            "组合体数据 {:?} 已保存至 `{}`",
            combined.shape(),
            self.out_file.display()
        );
        Ok(())
    }
}
