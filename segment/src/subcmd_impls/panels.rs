use crate::subcmd_impls::utils::rgb;
use image::{GenericImage, ImageResult, Rgb, RgbImage};
use mri::prelude::SliceView;
use ndarray::Array2;

/// 面板列数：输入、标注、预测、叠加。
const COLUMNS: u32 = 4;
/// 叠加列中预测颜色的不透明度。
const OVERLAY_ALPHA: f32 = 0.5;
/// 面板之间的黑色间隔（像素）。
const GAP: u32 = 2;

/// 将若干深度切片渲染为一张网格图，每个切片占一行。
pub fn render_panels(views: &[SliceView]) -> ImageResult<RgbImage> {
    let Some(first) = views.first() else {
        return Ok(RgbImage::new(0, 0));
    };
    let (h, w) = (first.image.nrows() as u32, first.image.ncols() as u32);
    let rows = views.len() as u32;
    let mut grid = RgbImage::from_pixel(
        COLUMNS * w + (COLUMNS - 1) * GAP,
        rows * h + rows.saturating_sub(1) * GAP,
        rgb::black(),
    );

    for (r, view) in views.iter().enumerate() {
        let y = r as u32 * (h + GAP);
        let gray = grayscale(&view.image);
        let cells = [
            Some(gray.clone()),
            view.ground_truth.as_ref().map(colorize),
            Some(colorize(&view.prediction)),
            Some(overlay(&gray, &view.prediction)),
        ];
        for (c, cell) in cells.into_iter().enumerate() {
            // 无标注时该格保持黑色
            let Some(cell) = cell else { continue };
            let x = c as u32 * (w + GAP);
            grid.copy_from(&cell, x, y)?;
        }
        log::debug!("已渲染切片 {}", view.index);
    }
    Ok(grid)
}

/// 将强度切片线性缩放到0..=255。常数切片输出全黑。
fn grayscale(image: &Array2<f32>) -> RgbImage {
    let (lo, hi) = image
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = if hi > lo { hi - lo } else { 1.0 };
    let (h, w) = image.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = image[[y as usize, x as usize]];
        let v = if v.is_nan() { 0.0 } else { (v - lo) / range };
        rgb::gray((v.clamp(0.0, 1.0) * 255.0).round() as u8)
    })
}

fn colorize(labels: &Array2<u8>) -> RgbImage {
    let (h, w) = labels.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        rgb::class_color(labels[[y as usize, x as usize]])
    })
}

fn overlay(gray: &RgbImage, labels: &Array2<u8>) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let base: Rgb<u8> = *gray.get_pixel(x, y);
        let top = rgb::class_color(labels[[y as usize, x as usize]]);
        rgb::blend(base, top, OVERLAY_ALPHA)
    })
}
