use super::model::SegmentationModel;
use crate::prep::consts::NUM_CHANNELS;
use crate::prep::{CombinedVolume, LabelVolume};
use crate::{Error, Result};
use ndarray::{ArrayD, ArrayViewD, Axis, Ix3};

/// 对组合体数据执行分割，返回离散标签体数据。
///
/// 插入批量维度得到(1, X, Y, Z, 4)，校验维数后调用模型，对输出的类别轴（第5轴）取argmax并去掉批量维度。
pub fn run_segmentation(
    model: &dyn SegmentationModel,
    input: &CombinedVolume,
) -> Result<LabelVolume> {
    let batched = input.view().insert_axis(Axis(0)).into_dyn();
    if batched.ndim() != 5 {
        return Err(Error::shape(
            "batched input",
            batched.shape(),
            "(batch_size, height, width, depth, channels)",
        ));
    }
    if batched.shape()[4] != NUM_CHANNELS {
        return Err(Error::shape(
            "batched input",
            batched.shape(),
            format!("{NUM_CHANNELS} channels"),
        ));
    }

    log::info!("模型`{}`推理中...", model.name());
    let prediction = model.predict(batched.view())?;
    check_prediction(&prediction, batched.shape())?;

    let labels = argmax_last_axis(prediction.view());
    labels
        .index_axis_move(Axis(0), 0)
        .into_dimensionality::<Ix3>()
        .map_err(|_| Error::shape("prediction", prediction.shape(), "5 dimensions"))
}

fn check_prediction(prediction: &ArrayD<f32>, input_shape: &[usize]) -> Result<()> {
    let shape = prediction.shape();
    let expected = format!(
        "(1, {}, {}, {}, classes)",
        input_shape[1], input_shape[2], input_shape[3]
    );
    if shape.len() != 5 || shape[0] != 1 || shape[1..4] != input_shape[1..4] || shape[4] == 0 {
        return Err(Error::shape("prediction", shape, expected));
    }
    if shape[4] > u8::MAX as usize + 1 {
        return Err(Error::shape("prediction", shape, "at most 256 classes"));
    }
    Ok(())
}

/// 沿最后一个轴取最大值的索引。相等时取最小索引；NaN不会被选中。
///
/// 最后一个轴的长度不得超过256。
pub fn argmax_last_axis<T>(scores: ArrayViewD<'_, T>) -> ArrayD<u8>
where
    T: PartialOrd + Copy,
{
    let last = Axis(scores.ndim() - 1);
    scores.map_axis(last, |lane| {
        let mut best = 0_usize;
        let mut best_val: Option<T> = None;
        for (i, &v) in lane.iter().enumerate() {
            // NaN与自身不相等
            #[allow(clippy::eq_op)]
            let comparable = v == v;
            if !comparable {
                continue;
            }
            match best_val {
                Some(b) if v <= b => {}
                _ => {
                    best = i;
                    best_val = Some(v);
                }
            }
        }
        best as u8
    })
}
