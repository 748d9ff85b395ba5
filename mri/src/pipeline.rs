//! 单次分割请求的完整流程：解压、定位模态文件、预处理、推理、打包。
//!
//! 状态按固定顺序推进：
//! `Idle -> FilesReceived -> Preprocessed -> Inferred -> Packaged -> Delivered -> Idle`。
//! 缺少模态文件时在`FilesReceived`之前终止；维数错误时在`Preprocessed`之后终止；两者都不产生输出文件。

use crate::infer::{run_segmentation, SegmentationModel};
use crate::pack::{package_labels, PackagedResult};
use crate::prep::consts::PREVIEW_SLICES;
use crate::prep::{
    adapt_ground_truth, combine_channels, load_volume, normalize, AccTimer, CombinedVolume,
    CropWindow, LabelVolume, Modality,
};
use crate::{Error, Result};
use ndarray::ArrayD;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 标注文件名后缀。
pub const GROUND_TRUTH_SUFFIX: &str = "seg.nii.gz";

/// 流水线参数。
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// 空间裁剪窗口。
    pub window: CropWindow,
    /// 可视化使用的深度切片。
    pub preview_slices: Vec<usize>,
}

impl PipelineConfig {
    /// 检查可视化切片是否落在裁剪后的深度范围内，应在推理之前调用。
    pub fn check_preview_slices(&self) -> Result<()> {
        let depth = self.window.extent()[2];
        match self.preview_slices.iter().find(|&&n| n >= depth) {
            Some(&index) => Err(Error::SliceOutOfRange { index, depth }),
            None => Ok(()),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: CropWindow::default(),
            preview_slices: PREVIEW_SLICES.to_vec(),
        }
    }
}

/// 流水线状态。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    Idle,
    FilesReceived,
    Preprocessed,
    Inferred,
    Packaged,
    Delivered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 记录状态转移与各阶段耗时。
struct Tracker {
    stage: Stage,
    timer: AccTimer,
    timings: Vec<(Stage, u64)>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            timer: AccTimer::new(),
            timings: Vec::with_capacity(5),
        }
    }

    fn advance(&mut self, next: Stage) {
        let ms = self.timer.elapsed();
        log::info!("{} -> {} ({ms} ms)", self.stage, next);
        self.timings.push((next, ms));
        self.stage = next;
        self.timer.start();
    }
}

/// 一个病例的输入文件。
#[derive(Clone, Debug)]
pub struct CaseFiles {
    /// 按`Modality::ALL`顺序排列。
    pub modalities: [PathBuf; 4],
    pub ground_truth: Option<PathBuf>,
}

impl CaseFiles {
    #[inline]
    pub fn path(&self, modality: Modality) -> &Path {
        &self.modalities[modality.channel()]
    }
}

/// 在`root`下递归查找模态文件与标注文件。
///
/// 按文件名排序遍历，每个后缀取第一个匹配，之后的重复文件记录警告后忽略。缺少任意模态时返回`MissingInputFile`。
pub fn locate_case_files<P: AsRef<Path>>(root: P) -> Result<CaseFiles> {
    let mut found: [Option<PathBuf>; 4] = Default::default();
    let mut ground_truth: Option<PathBuf> = None;

    for entry in WalkDir::new(root.as_ref()).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let slot = match Modality::from_file_name(name) {
            Some(m) => &mut found[m.channel()],
            None if name.ends_with(GROUND_TRUTH_SUFFIX) => &mut ground_truth,
            None => continue,
        };
        match slot {
            Some(first) => log::warn!(
                "忽略重复文件 `{}`，已使用 `{}`",
                entry.path().display(),
                first.display()
            ),
            None => *slot = Some(entry.into_path()),
        }
    }

    let missing: Vec<Modality> = Modality::ALL
        .into_iter()
        .filter(|m| found[m.channel()].is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingInputFile { missing });
    }
    let [t1n, t1c, t2f, t2w] = found.map(Option::unwrap_or_default);
    Ok(CaseFiles {
        modalities: [t1n, t1c, t2f, t2w],
        ground_truth,
    })
}

/// 将zip压缩包解压到`dest`目录。
pub fn extract_archive<P: AsRef<Path>, Q: AsRef<Path>>(archive: P, dest: Q) -> Result<()> {
    let file = File::open(archive.as_ref())?;
    let mut zip = zip::ZipArchive::new(file)?;
    log::debug!("解压 {} 个条目", zip.len());
    zip.extract(dest.as_ref())?;
    Ok(())
}

/// 单个病例的处理结果。
pub struct CaseOutcome {
    /// 原始模态体数据的形状。
    pub input_shape: Vec<usize>,
    pub combined: CombinedVolume,
    pub prediction: LabelVolume,
    /// 已按同一窗口裁剪、与`prediction`对齐的标注。
    pub ground_truth: Option<LabelVolume>,
    pub packaged: PackagedResult,
    /// 各阶段耗时（毫秒）。
    pub timings: Vec<(Stage, u64)>,
}

impl CaseOutcome {
    /// 将结果文件交付到`dir`目录。
    pub fn deliver<P: AsRef<Path>>(&mut self, dir: P) -> Result<PathBuf> {
        let mut timer = AccTimer::new();
        let path = self.packaged.save_to(dir)?;
        let ms = timer.elapsed();
        log::info!("{} -> {} ({ms} ms)", Stage::Packaged, Stage::Delivered);
        self.timings.push((Stage::Delivered, ms));
        log::info!("{} -> {}", Stage::Delivered, Stage::Idle);
        Ok(path)
    }
}

/// 规范化并组合四个模态。
pub fn preprocess_volumes(
    volumes: [ArrayD<f32>; 4],
    window: &CropWindow,
) -> Result<CombinedVolume> {
    let [t1n, t1c, t2f, t2w] = volumes;
    let t1n = normalize(t1n)?;
    let t1c = normalize(t1c)?;
    let t2f = normalize(t2f)?;
    let t2w = normalize(t2w)?;
    combine_channels([&t1n, &t1c, &t2f, &t2w], window)
}

/// 读取四个模态文件（规范顺序）。
pub fn load_modalities(files: &CaseFiles) -> Result<[ArrayD<f32>; 4]> {
    Ok([
        load_volume(files.path(Modality::T1n))?,
        load_volume(files.path(Modality::T1c))?,
        load_volume(files.path(Modality::T2f))?,
        load_volume(files.path(Modality::T2w))?,
    ])
}

/// 读取、适配并裁剪标注文件，使其与预测结果对齐。
pub fn load_ground_truth<P: AsRef<Path>>(path: P, window: &CropWindow) -> Result<LabelVolume> {
    let raw = load_volume(path)?;
    let adapted = adapt_ground_truth(raw)?;
    window.crop_labels(&adapted)
}

/// 处理一个已定位的病例。
pub fn process_case(
    files: &CaseFiles,
    model: &dyn SegmentationModel,
    config: &PipelineConfig,
) -> Result<CaseOutcome> {
    let mut tracker = Tracker::new();
    tracker.advance(Stage::FilesReceived);

    let volumes = load_modalities(files)?;
    let input_shape = volumes[0].shape().to_vec();
    let combined = preprocess_volumes(volumes, &config.window)?;
    log::info!("组合体数据形状: {:?}", combined.shape());
    tracker.advance(Stage::Preprocessed);

    let prediction = run_segmentation(model, &combined)?;
    let ground_truth = match files.ground_truth {
        Some(ref p) => Some(load_ground_truth(p, &config.window)?),
        None => None,
    };
    tracker.advance(Stage::Inferred);

    let packaged = package_labels(&prediction)?;
    tracker.advance(Stage::Packaged);
    log::info!("病例处理完成，共 {} ms", tracker.timer.get_total_ms());

    Ok(CaseOutcome {
        input_shape,
        combined,
        prediction,
        ground_truth,
        packaged,
        timings: tracker.timings,
    })
}

/// 处理一个zip压缩包。解压目录在返回前删除，清理失败只记录警告。
pub fn segment_archive<P: AsRef<Path>>(
    archive: P,
    model: &dyn SegmentationModel,
    config: &PipelineConfig,
) -> Result<CaseOutcome> {
    let scratch = tempfile::tempdir()?;
    extract_archive(archive, scratch.path())?;
    let files = locate_case_files(scratch.path())?;
    let outcome = process_case(&files, model, config);
    if let Err(e) = scratch.close() {
        log::warn!("解压目录清理失败: {e}");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::model::tests::ConstantModel;
    use crate::pack::write_volume;
    use ndarray::{Array3, IxDyn};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pattern(shape: (usize, usize, usize), k: usize) -> Array3<f32> {
        Array3::from_shape_fn(shape, |(x, y, z)| ((x * 31 + y * 17 + z * 7 + k * 5) % 97) as f32)
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            window: CropWindow::new(2..6, 2..6, 1..5),
            preview_slices: vec![0, 3],
        }
    }

    fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let mut w = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            w.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            w.write_all(bytes).unwrap();
        }
        w.finish().unwrap();
    }

    fn nifti_bytes(dir: &Path, name: &str, v: &Array3<f32>) -> Vec<u8> {
        let p = dir.join(name);
        write_volume(&p, v).unwrap();
        std::fs::read(&p).unwrap()
    }

    #[test]
    fn test_end_to_end_constant_class() {
        let volumes = [0, 1, 2, 3].map(|k| pattern((240, 240, 155), k).into_dyn());
        let combined = preprocess_volumes(volumes, &CropWindow::default()).unwrap();
        assert_eq!(combined.shape(), &[128, 128, 128, 4]);
        let model = ConstantModel { class: 2, classes: 4 };
        let labels = run_segmentation(&model, &combined).unwrap();
        assert_eq!(labels.shape(), &[128, 128, 128]);
        assert!(labels.iter().all(|&v| v == 2));
    }

    /// 记录调用次数的桩模型。
    struct CountingModel {
        inner: ConstantModel,
        calls: AtomicUsize,
    }

    impl SegmentationModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }

        fn predict(&self, input: ndarray::ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.predict(input)
        }
    }

    #[test]
    fn test_missing_file_archive() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("case.zip");
        write_zip(
            &archive,
            &[
                ("case/BraTS-0001-t1n.nii.gz", b"x".to_vec()),
                ("case/BraTS-0001-t1c.nii.gz", b"x".to_vec()),
                ("case/BraTS-0001-t2f.nii.gz", b"x".to_vec()),
                ("case/BraTS-0001-seg.nii.gz", b"x".to_vec()),
            ],
        );
        let model = CountingModel {
            inner: ConstantModel { class: 2, classes: 4 },
            calls: AtomicUsize::new(0),
        };
        let err = segment_archive(&archive, &model, &PipelineConfig::default())
            .err()
            .unwrap();
        match err {
            Error::MissingInputFile { missing } => assert_eq!(missing, vec![Modality::T2w]),
            e => panic!("unexpected error: {e}"),
        }
        // 在推理与打包之前终止
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        // 压缩包所在目录中只有压缩包本身
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_check_preview_slices() {
        let config = PipelineConfig::default();
        assert!(config.check_preview_slices().is_ok());

        let config = PipelineConfig {
            preview_slices: vec![75, 200],
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.check_preview_slices(),
            Err(Error::SliceOutOfRange { index: 200, depth: 128 })
        ));

        let config = PipelineConfig {
            preview_slices: vec![4],
            ..small_config()
        };
        assert!(matches!(
            config.check_preview_slices(),
            Err(Error::SliceOutOfRange { index: 4, depth: 4 })
        ));
    }

    #[test]
    fn test_archive_end_to_end() {
        let work = tempfile::tempdir().unwrap();
        let mut entries = Vec::new();
        for m in Modality::ALL {
            let name = format!("case-{}", m.suffix());
            let bytes = nifti_bytes(work.path(), &name, &pattern((8, 8, 6), m.channel()));
            entries.push((format!("BraTS/{name}"), bytes));
        }
        let seg = Array3::from_shape_fn((8, 8, 6), |(x, _, _)| (x % 5) as f32);
        entries.push((
            "BraTS/case-seg.nii.gz".to_string(),
            nifti_bytes(work.path(), "case-seg.nii.gz", &seg),
        ));
        let archive = work.path().join("upload.zip");
        let refs: Vec<(&str, Vec<u8>)> = entries
            .iter()
            .map(|(n, b)| (n.as_str(), b.clone()))
            .collect();
        write_zip(&archive, &refs);

        let model = ConstantModel { class: 1, classes: 4 };
        let mut outcome = segment_archive(&archive, &model, &small_config()).unwrap();
        assert_eq!(outcome.input_shape, vec![8, 8, 6]);
        assert_eq!(outcome.combined.shape(), &[4, 4, 4, 4]);
        assert!(outcome.prediction.iter().all(|&v| v == 1));

        let gt = outcome.ground_truth.as_ref().unwrap();
        assert_eq!(gt.shape(), &[4, 4, 4]);
        // 裁剪后的x=2对应原始x=4，标签4被迁移为3
        assert_eq!(gt[[2, 0, 0]], 3);
        assert_eq!(gt[[0, 0, 0]], 2);

        let out = tempfile::tempdir().unwrap();
        let path = outcome.deliver(out.path()).unwrap();
        assert!(path.ends_with(crate::pack::RESULT_FILE_NAME));
        let reloaded = load_volume(&path).unwrap();
        assert_eq!(reloaded.shape(), &[4, 4, 4]);
        assert_eq!(reloaded[IxDyn(&[3, 3, 3])], 1.0);

        let stages: Vec<Stage> = outcome.timings.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages,
            vec![
                Stage::FilesReceived,
                Stage::Preprocessed,
                Stage::Inferred,
                Stage::Packaged,
                Stage::Delivered
            ]
        );
    }

    #[test]
    fn test_locate_first_match_wins() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("a");
        let b = root.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        for m in Modality::ALL {
            std::fs::write(a.join(format!("x-{}", m.suffix())), b"").unwrap();
        }
        std::fs::write(b.join("y-t1n.nii.gz"), b"").unwrap();
        std::fs::write(b.join("notes.txt"), b"").unwrap();

        let files = locate_case_files(root.path()).unwrap();
        assert_eq!(files.path(Modality::T1n), a.join("x-t1n.nii.gz"));
        assert_eq!(files.path(Modality::T2w), a.join("x-t2w.nii.gz"));
        assert!(files.ground_truth.is_none());
    }

    #[test]
    fn test_locate_reports_all_missing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("x-t1c.nii.gz"), b"").unwrap();
        match locate_case_files(root.path()) {
            Err(Error::MissingInputFile { missing }) => {
                assert_eq!(missing, vec![Modality::T1n, Modality::T2f, Modality::T2w])
            }
            _ => panic!("expected MissingInputFile"),
        }
    }

    #[test]
    fn test_corrupt_archive_propagates() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("broken.zip");
        std::fs::write(&archive, b"not a zip").unwrap();
        let model = ConstantModel { class: 0, classes: 4 };
        assert!(matches!(
            segment_archive(&archive, &model, &PipelineConfig::default()),
            Err(Error::Archive(_))
        ));
    }
}
