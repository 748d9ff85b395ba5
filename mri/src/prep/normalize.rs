//! 体素强度的最小-最大规范化。

use crate::{Error, Result};
use ndarray::{ArrayD, Axis};

/// 将体数据的每个值缩放到[0, 1]区间。
///
/// 最后一个轴上的每个索引视为一个独立特征：其最小值与最大值在其余所有轴上统计。
/// 对三维体数据而言，即沿最后一个空间轴逐层独立规范化。
///
/// - 取值恒定的特征（最大值等于最小值）整体映射为0；
/// - 统计时忽略NaN，NaN保持原样；
/// - 0维数组返回`UnexpectedTensorShape`。
pub fn normalize(mut volume: ArrayD<f32>) -> Result<ArrayD<f32>> {
    let ndim = volume.ndim();
    if ndim == 0 {
        return Err(Error::shape("volume", volume.shape(), "at least 1 dimension"));
    }
    let last = Axis(ndim - 1);
    for mut feature in volume.axis_iter_mut(last) {
        let (lo, hi) = feature
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo > hi {
            // 全部为NaN（或为空）
            continue;
        }
        let range = if hi - lo == 0.0 { 1.0 } else { hi - lo };
        feature.mapv_inplace(|v| (v - lo) / range);
    }
    Ok(volume)
}
