use thiserror::Error;

use crate::math::tensor::Shape4;

/// Errors reported by the loss layer and its visualization helpers.
///
/// Every variant is a programmer or configuration error detected
/// synchronously at the offending call. None are transient, so none are
/// retried internally. Numeric overflow and NaN propagation are not
/// detected here; the layer trusts upstream numerical health.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LossError {
    /// Prediction and target disagree on channels, height, or width, or a
    /// tensor passed to forward/backward does not match the configured
    /// shape.
    #[error("shape mismatch: prediction {prediction} vs target {target}")]
    ShapeMismatch { prediction: Shape4, target: Shape4 },

    /// A zero-sized dimension would make the normalization divisor zero.
    #[error("empty input: {0} has a zero dimension")]
    EmptyInput(Shape4),

    /// The visualization context tensor is neither grayscale nor RGB.
    #[error("context tensor must have 1 or 3 channels, got {0}")]
    InvalidChannelCount(usize),

    /// A configuration value is out of range, e.g. the visualize channel.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// forward/backward called before a successful configure.
    #[error("loss layer used before configure()")]
    NotConfigured,
}
