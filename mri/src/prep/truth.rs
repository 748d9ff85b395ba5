use super::consts::{BRATS_ENHANCING, BRATS_LEGACY_ENHANCING, NUM_CLASSES};
use super::LabelVolume;
use crate::infer::argmax_last_axis;
use crate::{Error, Result};
use ndarray::{ArrayD, Axis, Ix3, IxDyn};

/// 将原始标注体数据转换为与预测结果可比的标签体数据。
///
/// 标签值必须是0..=255内的整数，转换为`u8`后将旧版增强肿瘤标签4迁移为3，经过4分类独热编码后以argmax还原。
/// 非整数、负数、NaN或迁移后仍不在0..=3内的标签返回`UnexpectedLabel`。
pub fn adapt_ground_truth(raw: ArrayD<f32>) -> Result<LabelVolume> {
    if raw.ndim() != 3 {
        return Err(Error::shape("ground truth", raw.shape(), "3 dimensions"));
    }
    if let Some(&bad) = raw.iter().find(|&&v| !is_label_value(v)) {
        return Err(Error::UnexpectedLabel(bad));
    }
    let mut mask = raw.mapv(|v| v as u8);
    migrate_labels(mask.view_mut());
    if let Some(&bad) = mask.iter().find(|&&v| v as usize >= NUM_CLASSES) {
        return Err(Error::UnexpectedLabel(f32::from(bad)));
    }

    let categorical = to_categorical(&mask);
    argmax_last_axis(categorical.view())
        .into_dimensionality::<Ix3>()
        .map_err(|_| Error::shape("ground truth", mask.shape(), "3 dimensions"))
}

#[inline]
fn is_label_value(v: f32) -> bool {
    v.is_finite() && v.fract() == 0.0 && (0.0..=255.0).contains(&v)
}

/// 将所有旧版增强肿瘤标签替换为新标签，返回被修改的体素个数。
pub fn migrate_labels(mut mask: ndarray::ArrayViewMutD<u8>) -> usize {
    let mut cnt = 0;
    mask.iter_mut()
        .filter(|v| **v == BRATS_LEGACY_ENHANCING)
        .for_each(|v| {
            cnt += 1;
            *v = BRATS_ENHANCING;
        });
    cnt
}

/// 按最后一个新轴展开为`NUM_CLASSES`类独热编码。调用者保证所有标签小于`NUM_CLASSES`。
fn to_categorical(mask: &ArrayD<u8>) -> ArrayD<u8> {
    let mut shape = mask.shape().to_vec();
    shape.push(NUM_CLASSES);
    let mut out = ArrayD::<u8>::zeros(IxDyn(&shape));
    let last = Axis(shape.len() - 1);
    for (mut lane, &label) in out.lanes_mut(last).into_iter().zip(mask.iter()) {
        lane[label as usize] = 1;
    }
    out
}
