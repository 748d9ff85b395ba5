use super::model::{ModelLoader, SegmentationModel};
use crate::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// ONNX Runtime模型加载器。
#[derive(Default)]
pub struct OnnxLoader {
    /// 推理线程数，0表示由运行时决定。
    pub intra_threads: usize,
}

impl ModelLoader for OnnxLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn SegmentationModel>> {
        Ok(Arc::new(OnnxModel::open(path, self.intra_threads)?))
    }
}

/// 以ONNX格式导出的三维分割网络。
pub struct OnnxModel {
    name: String,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn open(path: &Path, intra_threads: usize) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidModelFile {
            path: path.to_path_buf(),
            reason,
        };
        let mut builder = Session::builder()
            .map_err(|e| invalid(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| invalid(e.to_string()))?;
        if intra_threads > 0 {
            builder = builder
                .with_intra_threads(intra_threads)
                .map_err(|e| invalid(e.to_string()))?;
        }
        let session = builder
            .commit_from_file(path)
            .map_err(|e| invalid(e.to_string()))?;
        if session.outputs.is_empty() {
            return Err(invalid("model declares no outputs".to_string()));
        }
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            session: Mutex::new(session),
        })
    }
}

impl SegmentationModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_array((shape, data))
            .map_err(|e| Error::Inference(format!("cannot build input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let (out_shape, out_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("cannot read output tensor: {e}")))?;
        let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&dims), out_data.to_vec())
            .map_err(|e| Error::Inference(format!("output tensor shape {dims:?}: {e}")))
    }
}
