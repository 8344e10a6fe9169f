pub mod heatmap;
pub mod options;

pub use heatmap::HeatmapLoss;
pub use options::VisualizeOptions;
