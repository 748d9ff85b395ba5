use super::cache::ModelCache;
use crate::{Error, Result};
use ndarray::{ArrayD, ArrayViewD};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// 预训练的三维分割网络。
///
/// 输入为(1, X, Y, Z, 4)的批量张量，输出为(1, X, Y, Z, K)的类别概率张量。
pub trait SegmentationModel: Send + Sync {
    /// 用于日志与报告的模型名称。
    fn name(&self) -> &str;

    /// 执行一次前向推理。
    fn predict(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>>;
}

/// 从序列化文件构造模型。
pub trait ModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn SegmentationModel>>;
}

impl<F> ModelLoader for F
where
    F: Fn(&Path) -> Result<Arc<dyn SegmentationModel>>,
{
    fn load(&self, path: &Path) -> Result<Arc<dyn SegmentationModel>> {
        self(path)
    }
}

/// 未启用任何推理后端时使用的加载器。
pub(crate) struct UnsupportedLoader;

impl ModelLoader for UnsupportedLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn SegmentationModel>> {
        Err(Error::InvalidModelFile {
            path: path.to_path_buf(),
            reason: "built without onnx support (enable the `onnx` feature)".to_string(),
        })
    }
}

/// 本次处理所用模型的来源。
#[derive(Clone, Debug, PartialEq)]
pub enum ModelOrigin {
    /// 用户提供的模型。
    Uploaded,
    /// 默认模型。
    Default,
    /// 用户模型加载失败，回退为默认模型；保存失败原因。
    Fallback(String),
}

impl fmt::Display for ModelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelOrigin::Uploaded => f.write_str("uploaded"),
            ModelOrigin::Default => f.write_str("default"),
            ModelOrigin::Fallback(reason) => write!(f, "default (fallback: {reason})"),
        }
    }
}

/// 显式传递给流水线的模型选择结果。
#[derive(Clone)]
pub struct SelectedModel {
    pub model: Arc<dyn SegmentationModel>,
    pub origin: ModelOrigin,
}

/// 选择本次处理使用的模型。
///
/// 若给出`uploaded`则优先尝试加载；加载失败时记录`InvalidModelFile`并回退到`cache`中的默认模型，而不是中止。
pub fn select_model(
    cache: &ModelCache,
    uploaded: Option<&Path>,
    loader: &dyn ModelLoader,
) -> Result<SelectedModel> {
    if let Some(path) = uploaded {
        match loader.load(path) {
            Ok(model) => {
                log::info!("已加载自定义模型 `{}`", model.name());
                return Ok(SelectedModel {
                    model,
                    origin: ModelOrigin::Uploaded,
                });
            }
            Err(e) => {
                log::warn!("自定义模型加载失败: {e}");
                log::warn!("改用默认模型");
                let model = cache.get_or_load(loader)?;
                return Ok(SelectedModel {
                    model,
                    origin: ModelOrigin::Fallback(e.to_string()),
                });
            }
        }
    }
    log::info!("使用默认模型");
    Ok(SelectedModel {
        model: cache.get_or_load(loader)?,
        origin: ModelOrigin::Default,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::IxDyn;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 对每个体素输出固定独热概率的桩模型。
    pub(crate) struct ConstantModel {
        pub class: usize,
        pub classes: usize,
    }

    impl SegmentationModel for ConstantModel {
        fn name(&self) -> &str {
            "constant"
        }

        fn predict(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
            let mut shape = input.shape().to_vec();
            *shape.last_mut().unwrap() = self.classes;
            let mut out = ArrayD::<f32>::from_elem(IxDyn(&shape), 0.05);
            out.index_axis_mut(ndarray::Axis(shape.len() - 1), self.class)
                .fill(0.85);
            Ok(out)
        }
    }

    struct CountingLoader {
        calls: AtomicUsize,
        good: PathBuf,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self, path: &Path) -> Result<Arc<dyn SegmentationModel>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path == self.good {
                Ok(Arc::new(ConstantModel { class: 1, classes: 4 }))
            } else {
                Err(Error::InvalidModelFile {
                    path: path.to_path_buf(),
                    reason: "not a model".to_string(),
                })
            }
        }
    }

    #[test]
    fn test_select_uploaded() {
        let loader = CountingLoader {
            calls: AtomicUsize::new(0),
            good: PathBuf::from("good.onnx"),
        };
        let cache = ModelCache::new("default.onnx");
        let s = select_model(&cache, Some(Path::new("good.onnx")), &loader).unwrap();
        assert_eq!(s.origin, ModelOrigin::Uploaded);
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_select_falls_back_to_default() {
        let loader = CountingLoader {
            calls: AtomicUsize::new(0),
            good: PathBuf::from("default.onnx"),
        };
        let cache = ModelCache::new("default.onnx");
        let s = select_model(&cache, Some(Path::new("broken.onnx")), &loader).unwrap();
        assert!(matches!(s.origin, ModelOrigin::Fallback(ref r) if r.contains("not a model")));
        assert_eq!(s.model.name(), "constant");
        assert!(cache.is_loaded());
    }

    #[test]
    fn test_select_default_fails_when_default_missing() {
        let loader = CountingLoader {
            calls: AtomicUsize::new(0),
            good: PathBuf::from("elsewhere.onnx"),
        };
        let cache = ModelCache::new("default.onnx");
        assert!(matches!(
            select_model(&cache, None, &loader),
            Err(Error::InvalidModelFile { .. })
        ));
    }

    #[test]
    fn test_unsupported_loader_reports_invalid_model() {
        let err = UnsupportedLoader
            .load(Path::new("model.onnx"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("onnx"));
    }
}
