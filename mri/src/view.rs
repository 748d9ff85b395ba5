//! 可视化切片的选取与旋转。渲染由调用方完成。

use crate::prep::consts::{
    BRATS_BACKGROUND, BRATS_EDEMA, BRATS_ENHANCING, BRATS_NECROTIC, NUM_CLASSES,
};
use crate::prep::{CombinedVolume, LabelVolume, Modality};
use crate::{Error, Result};
use ndarray::{s, Array2, ArrayView2, Axis};

/// 同一深度上的一组待渲染切片，均已旋转90°。
pub struct SliceView {
    /// 深度轴索引。
    pub index: usize,
    /// T1n通道的强度切片。
    pub image: Array2<f32>,
    pub ground_truth: Option<Array2<u8>>,
    pub prediction: Array2<u8>,
}

/// 逆时针旋转90°：`out[i, j] = m[j, w - 1 - i]`，输出形状为(w, h)。
pub fn rot90<A: Clone>(m: ArrayView2<'_, A>) -> Array2<A> {
    let mut t = m.reversed_axes();
    t.invert_axis(Axis(0));
    t.to_owned()
}

/// 按深度索引`indices`选取输入、标注（若有）与预测的切片。
///
/// 标注必须与预测逐体素对齐（见`CropWindow::crop_labels`）。
pub fn select_slices(
    combined: &CombinedVolume,
    ground_truth: Option<&LabelVolume>,
    prediction: &LabelVolume,
    indices: &[usize],
) -> Result<Vec<SliceView>> {
    let depth = prediction.shape()[2];
    let mut views = Vec::with_capacity(indices.len());
    for &n in indices {
        check_depth(n, combined.shape()[2])?;
        check_depth(n, depth)?;
        if let Some(gt) = ground_truth {
            check_depth(n, gt.shape()[2])?;
        }
        let channel = Modality::T1n.channel();
        views.push(SliceView {
            index: n,
            image: rot90(combined.slice(s![.., .., n, channel])),
            ground_truth: ground_truth.map(|gt| rot90(gt.slice(s![.., .., n]))),
            prediction: rot90(prediction.slice(s![.., .., n])),
        });
    }
    Ok(views)
}

/// 各类别的体素数。长度至少为`NUM_CLASSES`。
pub fn label_histogram(labels: &LabelVolume) -> Vec<usize> {
    let mut counts = vec![0_usize; NUM_CLASSES];
    for &v in labels.iter() {
        let v = v as usize;
        if v >= counts.len() {
            counts.resize(v + 1, 0);
        }
        counts[v] += 1;
    }
    counts
}

/// 类别名称，用于报告。
pub fn class_name(label: u8) -> &'static str {
    match label {
        BRATS_BACKGROUND => "background",
        BRATS_NECROTIC => "necrotic",
        BRATS_EDEMA => "edema",
        BRATS_ENHANCING => "enhancing",
        _ => "unknown",
    }
}

#[inline]
fn check_depth(index: usize, depth: usize) -> Result<()> {
    if index >= depth {
        return Err(Error::SliceOutOfRange { index, depth });
    }
    Ok(())
}
