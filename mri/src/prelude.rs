pub use super::infer::{
    default_loader, run_segmentation, select_model, ModelCache, ModelLoader, ModelOrigin,
    SegmentationModel, SelectedModel,
};
pub use super::pack::{package_labels, write_npy, PackagedResult, RESULT_FILE_NAME};
pub use super::pipeline::{
    locate_case_files, process_case, segment_archive, CaseFiles, CaseOutcome, PipelineConfig,
    Stage,
};
pub use super::prep::consts::{
    BRATS_BACKGROUND, BRATS_EDEMA, BRATS_ENHANCING, BRATS_NECROTIC, NUM_CLASSES, PREVIEW_SLICES,
};
pub use super::prep::{AccTimer, CombinedVolume, CropWindow, LabelVolume, Modality};
pub use super::view::{class_name, label_histogram, rot90, select_slices, SliceView};
pub use super::{Error, Result};
