pub mod frame;
pub mod prep;
pub mod overlay;
pub mod sink;

pub use frame::{Peak, VisualizationFrame};
pub use overlay::{Overlay, OverlayImage};
pub use sink::{DisplaySink, NoopSink, PngDirSink};
