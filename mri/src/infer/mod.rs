//! 模型句柄与推理编排。

pub mod cache;
pub mod model;
pub mod orchestrate;

cfg_if::cfg_if! {
    if #[cfg(feature = "onnx")] {
        mod onnx;
        pub use self::onnx::{OnnxLoader, OnnxModel};
    }
}

pub use cache::ModelCache;
pub use model::{select_model, ModelLoader, ModelOrigin, SegmentationModel, SelectedModel};
pub use orchestrate::{argmax_last_axis, run_segmentation};

/// 当前构建可用的模型加载器。
///
/// 启用`onnx`特性时为ONNX Runtime后端；否则任何模型文件都会被报告为无法加载。
pub fn default_loader() -> Box<dyn ModelLoader> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "onnx")] {
            Box::new(OnnxLoader::default())
        } else {
            Box::new(model::UnsupportedLoader)
        }
    }
}
