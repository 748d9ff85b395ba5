use crate::Result;
use ndarray::ArrayD;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;

/// 读取一个（可gzip压缩的）NIfTI文件，返回`f32`体数据。
///
/// 保留文件中的轴顺序与维数，不做重采样或方向校正。缩放斜率与截距由读取器应用。
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<ArrayD<f32>> {
    let path = path.as_ref();
    log::debug!("读取体数据 `{}`", path.display());
    let obj = ReaderOptions::new().read_file(path)?;
    let volume = obj.into_volume().into_ndarray::<f32>()?;
    log::debug!("\t形状: {:?}", volume.shape());
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::load_volume;
    use crate::pack::write_volume;
    use crate::Error;
    use ndarray::{Array3, IxDyn};

    #[test]
    fn test_load_preserves_shape_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case-t1n.nii.gz");
        let v = Array3::from_shape_fn((3, 4, 5), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        write_volume(&path, &v).unwrap();

        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.shape(), &[3, 4, 5]);
        assert_eq!(loaded[IxDyn(&[2, 3, 4])], 234.0);
        assert_eq!(loaded[IxDyn(&[1, 0, 2])], 102.0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken-t1n.nii");
        std::fs::write(&path, b"definitely not a nifti header").unwrap();
        assert!(matches!(load_volume(&path), Err(Error::Nifti(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_volume(dir.path().join("absent.nii.gz")).is_err());
    }
}
