use serde::{Serialize, Deserialize};

/// Visualization settings for a [`HeatmapLoss`](crate::loss::heatmap::HeatmapLoss) run.
///
/// # Fields
/// - `enabled`     — whether forward passes render diagnostic overlays
/// - `channel`     — which heatmap channel to capture (0-based)
/// - `window_size` — square edge length of the rendered overlays, in pixels
///
/// Options are resolved once per run, at engine construction, not per call.
/// When `enabled` is true every forward pass blocks on the display sink
/// once per image; keep it off for real training runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizeOptions {
    pub enabled: bool,
    pub channel: usize,
    pub window_size: u32,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        VisualizeOptions {
            enabled: false,
            channel: 0,
            window_size: 256,
        }
    }
}

impl VisualizeOptions {
    /// Enables visualization of `channel` with the default window size.
    pub fn channel(channel: usize) -> VisualizeOptions {
        VisualizeOptions {
            enabled: true,
            channel,
            ..Default::default()
        }
    }
}
