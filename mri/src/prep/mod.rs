pub mod combine;
pub mod loader;
pub mod log;
pub mod modality;
pub mod normalize;
pub mod truth;

pub use combine::{combine_channels, CropWindow};
pub use loader::load_volume;
pub use log::AccTimer;
pub use modality::Modality;
pub use normalize::normalize;
pub use truth::adapt_ground_truth;

/// 体数据与标签取值。
pub mod consts {
    /// BraTS标注中，背景的标签值。
    pub const BRATS_BACKGROUND: u8 = 0;

    /// BraTS标注中，坏死肿瘤核心的标签值。
    pub const BRATS_NECROTIC: u8 = 1;

    /// BraTS标注中，水肿区域的标签值。
    pub const BRATS_EDEMA: u8 = 2;

    /// 四分类方案中，增强肿瘤的标签值。
    pub const BRATS_ENHANCING: u8 = 3;

    /// 旧版BraTS标注中增强肿瘤使用的标签值，需要迁移为`BRATS_ENHANCING`。
    pub const BRATS_LEGACY_ENHANCING: u8 = 4;

    /// 分类数。
    pub const NUM_CLASSES: usize = 4;

    /// 模态（通道）数。
    pub const NUM_CHANNELS: usize = 4;

    /// 默认裁剪窗口，三个空间轴上的半开区间。
    pub const CROP_X: (usize, usize) = (56, 184);
    pub const CROP_Y: (usize, usize) = (56, 184);
    pub const CROP_Z: (usize, usize) = (13, 141);

    /// 默认可视化切片（深度轴）。
    pub const PREVIEW_SLICES: [usize; 3] = [75, 90, 100];
}

/// 标签体数据：每个体素保存一个类别索引。
pub type LabelVolume = ndarray::Array3<u8>;

/// 四通道组合体数据，形状为(X, Y, Z, 4)。
pub type CombinedVolume = ndarray::Array4<f32>;
