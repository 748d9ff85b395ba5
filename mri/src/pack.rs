//! 分割结果打包为NIfTI文件。

use crate::prep::LabelVolume;
use crate::{Error, Result};
use ndarray::{ArrayBase, Data, Dimension, RemoveAxis};
use ndarray_npy::WritableElement;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// 交付给用户的结果文件名。
pub const RESULT_FILE_NAME: &str = "segmentation_result.nii.gz";

/// 一次性交付的结果文件内容。
#[derive(Debug)]
pub struct PackagedResult {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

impl PackagedResult {
    /// 将结果写入`dir`目录，返回文件路径。
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// 单位仿射变换、单位体素尺寸的NIfTI-1头。不保留任何方向或缩放信息。
pub fn identity_header() -> NiftiHeader {
    NiftiHeader {
        pixdim: [1.0; 8],
        qform_code: 0,
        sform_code: 1,
        srow_x: [1.0, 0.0, 0.0, 0.0],
        srow_y: [0.0, 1.0, 0.0, 0.0],
        srow_z: [0.0, 0.0, 1.0, 0.0],
        ..NiftiHeader::default()
    }
}

/// 以单位仿射变换写出`f32`体数据。路径以`.gz`结尾时压缩写出。
pub fn write_volume<P, S, D>(path: P, volume: &ArrayBase<S, D>) -> Result<()>
where
    P: AsRef<Path>,
    S: Data<Elem = f32>,
    D: Dimension + RemoveAxis,
{
    let header = identity_header();
    WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(volume)?;
    Ok(())
}

/// 将标签体数据转换为`f32`后写出到`path`。
pub fn write_labels<P: AsRef<Path>>(path: P, labels: &LabelVolume) -> Result<()> {
    let voxels = labels.mapv(f32::from);
    write_volume(path, &voxels)
}

/// 将数组写为`.npy`文件，供离线检查使用。
pub fn write_npy<P, A, S, D>(path: P, array: &ArrayBase<S, D>) -> Result<()>
where
    P: AsRef<Path>,
    A: WritableElement,
    S: Data<Elem = A>,
    D: Dimension,
{
    ndarray_npy::write_npy(path.as_ref(), array)?;
    log::debug!("已写出 {}", path.as_ref().display());
    Ok(())
}

/// 将标签体数据打包为压缩NIfTI文件并读回其内容，随后删除该文件。
pub fn package_labels(labels: &LabelVolume) -> Result<PackagedResult> {
    let scratch = tempfile::tempdir()?;
    let result = package_labels_in(scratch.path(), labels);
    scratch.close()?;
    result
}

/// 在`scratch`目录中打包。无论成功与否，结果文件都不会留在目录中。
fn package_labels_in(scratch: &Path, labels: &LabelVolume) -> Result<PackagedResult> {
    let path = scratch.join(RESULT_FILE_NAME);
    let delivered = write_labels(&path, labels).and_then(|()| Ok(fs::read(&path)?));
    let removed = match fs::remove_file(&path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(Error::from(e)),
        _ => Ok(()),
    };
    let bytes = delivered?;
    removed?;
    log::info!("结果文件已打包: {} 字节", bytes.len());
    Ok(PackagedResult {
        file_name: RESULT_FILE_NAME,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prep::load_volume;
    use ndarray::{Array3, IxDyn};

    fn labels() -> LabelVolume {
        Array3::from_shape_fn((6, 5, 4), |(x, y, z)| ((x * 3 + y + z * 7) % 4) as u8)
    }

    #[test]
    fn test_package_round_trip() {
        let labels = labels();
        let packaged = package_labels(&labels).unwrap();
        assert_eq!(packaged.file_name, RESULT_FILE_NAME);
        assert_eq!(&packaged.bytes[..2], &[0x1f, 0x8b]);

        let out = tempfile::tempdir().unwrap();
        let path = packaged.save_to(out.path()).unwrap();
        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.shape(), labels.shape());
        for ((x, y, z), &v) in labels.indexed_iter() {
            assert!((loaded[IxDyn(&[x, y, z])] - f32::from(v)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_package_leaves_no_file() {
        let scratch = tempfile::tempdir().unwrap();
        package_labels_in(scratch.path(), &labels()).unwrap();
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_npy_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prediction.npy");
        let labels = labels();
        write_npy(&path, &labels).unwrap();
        let back: LabelVolume = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(back, labels);
    }

    #[test]
    fn test_identity_header() {
        let h = identity_header();
        assert_eq!(h.sform_code, 1);
        assert_eq!(h.srow_x, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(h.srow_y, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(h.srow_z, [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(h.pixdim[1..4], [1.0, 1.0, 1.0]);
    }
}
