pub mod math;
pub mod error;
pub mod loss;
pub mod vis;

// Convenience re-exports
pub use math::tensor::{Shape4, Tensor4};
pub use math::slice::Slice2;
pub use error::LossError;
pub use loss::heatmap::HeatmapLoss;
pub use loss::options::VisualizeOptions;
pub use vis::frame::{Peak, VisualizationFrame};
pub use vis::sink::{DisplaySink, NoopSink, PngDirSink};
