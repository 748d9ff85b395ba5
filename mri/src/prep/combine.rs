use super::consts::{CROP_X, CROP_Y, CROP_Z, NUM_CHANNELS};
use super::{CombinedVolume, LabelVolume, Modality};
use crate::{Error, Result};
use ndarray::{s, ArrayD, ArrayView, Axis, Ix4};
use std::ops::Range;

/// 三个空间轴上的裁剪窗口（半开区间）。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CropWindow {
    pub x: Range<usize>,
    pub y: Range<usize>,
    pub z: Range<usize>,
}

impl CropWindow {
    #[inline]
    pub fn new(x: Range<usize>, y: Range<usize>, z: Range<usize>) -> Self {
        Self { x, y, z }
    }

    /// 裁剪后的空间形状。
    #[inline]
    pub fn extent(&self) -> [usize; 3] {
        [self.x.len(), self.y.len(), self.z.len()]
    }

    /// 体数据必须达到的最小空间形状。
    #[inline]
    pub fn required(&self) -> [usize; 3] {
        [self.x.end, self.y.end, self.z.end]
    }

    /// 判断空间形状为`shape`的体数据能否容纳该窗口。
    pub fn fits(&self, shape: &[usize]) -> bool {
        shape.len() >= 3 && self.required().iter().zip(shape).all(|(r, s)| r <= s)
    }

    /// 以同样的窗口裁剪标签体数据，使其与组合体数据逐体素对齐。
    pub fn crop_labels(&self, labels: &LabelVolume) -> Result<LabelVolume> {
        if !self.fits(labels.shape()) {
            return Err(Error::VolumeTooSmall {
                shape: labels.shape().to_vec(),
                required: self.required(),
            });
        }
        Ok(labels
            .slice(s![self.x.clone(), self.y.clone(), self.z.clone()])
            .to_owned())
    }
}

impl Default for CropWindow {
    fn default() -> Self {
        Self::new(
            CROP_X.0..CROP_X.1,
            CROP_Y.0..CROP_Y.1,
            CROP_Z.0..CROP_Z.1,
        )
    }
}

/// 将四个模态按规范顺序{T1n, T1c, T2f, T2w}沿新的最后一个轴堆叠，再按`window`裁剪空间轴。
///
/// 堆叠前显式检查四个体数据形状一致；堆叠结果必须恰好为4维。
pub fn combine_channels(
    volumes: [&ArrayD<f32>; NUM_CHANNELS],
    window: &CropWindow,
) -> Result<CombinedVolume> {
    let reference = volumes[0].shape();
    for (modality, v) in Modality::ALL.into_iter().zip(volumes.iter()).skip(1) {
        if v.shape() != reference {
            return Err(Error::ShapeMismatch {
                modality,
                reference: Modality::T1n,
                found: v.shape().to_vec(),
                expected: reference.to_vec(),
            });
        }
    }

    let views: Vec<ArrayView<f32, _>> = volumes.iter().map(|v| v.view()).collect();
    let stacked = ndarray::stack(Axis(reference.len()), &views)
        .map_err(|_| Error::shape("stacked volume", reference, "equal modality shapes"))?;
    if stacked.ndim() != 4 {
        return Err(Error::shape(
            "combined volume",
            stacked.shape(),
            "(height, width, depth, channels)",
        ));
    }
    let stacked = stacked
        .into_dimensionality::<Ix4>()
        .map_err(|_| Error::shape("combined volume", reference, "4 dimensions"))?;

    if !window.fits(stacked.shape()) {
        return Err(Error::VolumeTooSmall {
            shape: stacked.shape().to_vec(),
            required: window.required(),
        });
    }
    let cropped = stacked
        .slice(s![window.x.clone(), window.y.clone(), window.z.clone(), ..])
        .to_owned();
    log::debug!("组合体数据: {:?} -> {:?}", stacked.shape(), cropped.shape());
    Ok(cropped)
}
