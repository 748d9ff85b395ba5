use super::model::{ModelLoader, SegmentationModel};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// 默认模型的惰性初始化句柄。
///
/// 第一次`get_or_load`时加载模型，之后只读复用，不会失效。初始化由互斥锁保护，
/// 并发首次调用时加载器也只执行一次；加载失败不会写入缓存，之后的调用可以重试。
pub struct ModelCache {
    path: PathBuf,
    model: OnceLock<Arc<dyn SegmentationModel>>,
    init: Mutex<()>,
}

impl ModelCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            model: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// 默认模型文件路径。
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// 获得默认模型；若尚未加载则用`loader`加载。
    pub fn get_or_load(&self, loader: &dyn ModelLoader) -> Result<Arc<dyn SegmentationModel>> {
        if let Some(m) = self.model.get() {
            return Ok(Arc::clone(m));
        }
        let _guard = self
            .init
            .lock()
            .map_err(|_| Error::Inference("default model initialisation poisoned".to_string()))?;
        if let Some(m) = self.model.get() {
            return Ok(Arc::clone(m));
        }
        log::info!("加载默认模型 `{}`", self.path.display());
        let model = loader.load(&self.path)?;
        Ok(Arc::clone(self.model.get_or_init(|| model)))
    }
}
