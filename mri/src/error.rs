use crate::prep::Modality;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 流水线中所有可报告的错误。
#[derive(Debug, Error)]
pub enum Error {
    /// 压缩包中缺少必需的模态文件。
    #[error("archive is missing required NIfTI files: {}", list_modalities(.missing))]
    MissingInputFile { missing: Vec<Modality> },

    /// 用户提供的模型文件无法加载。
    #[error("cannot load model `{}`: {reason}", .path.display())]
    InvalidModelFile { path: PathBuf, reason: String },

    /// 张量维度不符合要求。
    #[error("unexpected shape for {what}: {shape:?}, expected {expected}")]
    UnexpectedTensorShape {
        what: &'static str,
        shape: Vec<usize>,
        expected: String,
    },

    /// 四个模态的体数据形状不一致。
    #[error("{modality} volume has shape {found:?}, but {reference} has shape {expected:?}")]
    ShapeMismatch {
        modality: Modality,
        reference: Modality,
        found: Vec<usize>,
        expected: Vec<usize>,
    },

    /// 体数据小于裁剪窗口。
    #[error("volume of shape {shape:?} does not contain the crop window ending at {required:?}")]
    VolumeTooSmall { shape: Vec<usize>, required: [usize; 3] },

    /// 标注中出现了无法映射到四分类的标签（保留原始值）。
    #[error("ground truth contains label {0}, which is outside 0..=3 after remapping")]
    UnexpectedLabel(f32),

    /// 可视化切片越界。
    #[error("slice {index} is out of range for depth {depth}")]
    SliceOutOfRange { index: usize, depth: usize },

    /// 模型推理失败。
    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 构造一个`UnexpectedTensorShape`错误。
    pub(crate) fn shape(what: &'static str, shape: &[usize], expected: impl Into<String>) -> Self {
        Error::UnexpectedTensorShape {
            what,
            shape: shape.to_vec(),
            expected: expected.into(),
        }
    }
}

fn list_modalities(missing: &[Modality]) -> String {
    missing
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
