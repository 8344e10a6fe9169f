use log::{debug, warn};

use crate::error::LossError;
use crate::loss::options::VisualizeOptions;
use crate::math::tensor::{Shape4, Tensor4};
use crate::vis::frame::VisualizationFrame;
use crate::vis::overlay;
use crate::vis::sink::{DisplaySink, NoopSink};

/// Euclidean loss over batched heatmap tensors.
///
/// `forward` returns the sum of per-pixel squared differences between
/// prediction and ground truth, normalized by the total element count
/// `N * C * H * W`. `backward` writes the raw elementwise difference
/// `prediction - target` into both caller-owned gradient buffers.
///
/// The engine starts unconfigured; a successful [`configure`](Self::configure)
/// moves it to the ready state, where it stays across repeated
/// forward/backward calls until the input shapes change (which requires
/// reconfiguration). Not thread-safe: callers must not invoke forward and
/// backward concurrently on one instance.
///
/// When visualization is enabled the forward pass additionally captures the
/// selected channel of every image into a [`VisualizationFrame`], composes
/// diagnostic overlays, and blocks on the display sink once per image. That
/// stall is a deliberate debugging aid; the only way out of the wait is the
/// sink's acknowledgement, so visualization must never be enabled in a real
/// training run.
pub struct HeatmapLoss {
    options: VisualizeOptions,
    sink: Box<dyn DisplaySink>,
    configured: Option<Shape4>,
    /// Elementwise prediction - target. Reallocated on configure,
    /// overwritten on every backward, leaves the engine only by copy.
    diff: Tensor4,
}

impl HeatmapLoss {
    /// Creates an unconfigured engine with visualization disabled.
    pub fn new() -> HeatmapLoss {
        HeatmapLoss::with_options(VisualizeOptions::default())
    }

    /// Creates an unconfigured engine with the given visualization options
    /// and a no-op display sink.
    pub fn with_options(options: VisualizeOptions) -> HeatmapLoss {
        HeatmapLoss {
            options,
            sink: Box::new(NoopSink),
            configured: None,
            diff: Tensor4::zeros(Shape4::new(0, 0, 0, 0)),
        }
    }

    /// Replaces the display sink, e.g. with a
    /// [`PngDirSink`](crate::vis::sink::PngDirSink).
    pub fn with_sink(mut self, sink: Box<dyn DisplaySink>) -> HeatmapLoss {
        self.sink = sink;
        self
    }

    /// Validates the two input shapes and (re)allocates the internal
    /// difference tensor to the prediction's full shape. Must be called
    /// before `forward`/`backward` and again whenever the shapes change.
    ///
    /// Channels, height, and width must match between prediction and
    /// target; if visualization is enabled the selected channel must be in
    /// range.
    pub fn configure(&mut self, prediction: Shape4, target: Shape4) -> Result<(), LossError> {
        if !prediction.same_extents(&target) {
            return Err(LossError::ShapeMismatch { prediction, target });
        }
        if self.options.enabled && self.options.channel >= prediction.channels {
            return Err(LossError::Configuration(format!(
                "visualize channel {} out of range for {} channels",
                self.options.channel, prediction.channels
            )));
        }
        self.diff = Tensor4::zeros(prediction);
        self.configured = Some(prediction);
        Ok(())
    }

    /// Computes the normalized Euclidean loss over the batch.
    ///
    /// Accumulates `(prediction - target)^2` over every image, channel, and
    /// pixel, then divides by `N * C * H * W`. The batch iteration bound is
    /// read from `target`. Deterministic given identical inputs.
    ///
    /// `context` is an optional side-channel tensor (typically the original
    /// input image) used only by the context overlay when visualization is
    /// enabled; it never participates in the loss.
    pub fn forward(
        &mut self,
        prediction: &Tensor4,
        target: &Tensor4,
        context: Option<&Tensor4>,
    ) -> Result<f64, LossError> {
        let shape = self.check_ready(prediction, target)?;
        if shape.is_empty() {
            return Err(LossError::EmptyInput(shape));
        }

        debug!("input extents: {}", shape);

        let num_images = target.shape.num;
        let Shape4 { channels, height, width, .. } = shape;

        let mut raw_sum = 0.0;
        for n in 0..num_images {
            let mut frame = if self.options.enabled {
                Some(VisualizationFrame::new(height, width))
            } else {
                None
            };

            for c in 0..channels {
                for row in 0..height {
                    for col in 0..width {
                        let diff = prediction.at(n, c, row, col) - target.at(n, c, row, col);
                        raw_sum += diff * diff;

                        if c == self.options.channel {
                            if let Some(frame) = frame.as_mut() {
                                frame.predicted.set(row, col, prediction.at(n, c, row, col));
                                frame.ground_truth.set(row, col, target.at(n, c, row, col));
                                frame.diff.set(row, col, diff * diff);
                            }
                        }
                    }
                }
            }

            if let Some(mut frame) = frame {
                self.visualize(&mut frame, raw_sum, context, n);
            }
        }

        debug!("total loss: {}", raw_sum);
        let loss = raw_sum / (num_images * channels * height * width) as f64;
        debug!("total normalized loss: {}", loss);
        Ok(loss)
    }

    /// Writes the loss gradient into both caller-owned buffers:
    /// `grad_prediction[i] = grad_target[i] = prediction[i] - target[i]`
    /// for every linear index.
    ///
    /// The gradient is deliberately neither divided by the `N * C * H * W`
    /// normalization applied to the forward value nor by the factor of 2
    /// from the squared-error derivative. Downstream learning-rate
    /// conventions may depend on this exact scale, so it is preserved as
    /// observed behavior rather than "corrected".
    pub fn backward(
        &mut self,
        prediction: &Tensor4,
        target: &Tensor4,
        grad_prediction: &mut Tensor4,
        grad_target: &mut Tensor4,
    ) -> Result<(), LossError> {
        let shape = self.check_ready(prediction, target)?;
        for grad in [&*grad_prediction, &*grad_target] {
            if grad.shape != shape {
                return Err(LossError::ShapeMismatch {
                    prediction: grad.shape,
                    target: shape,
                });
            }
        }

        // Overwrite the owned difference tensor, then copy it out verbatim.
        for (d, (p, t)) in self
            .diff
            .as_mut_slice()
            .iter_mut()
            .zip(prediction.as_slice().iter().zip(target.as_slice().iter()))
        {
            *d = p - t;
        }
        grad_prediction.as_mut_slice().copy_from_slice(self.diff.as_slice());
        grad_target.as_mut_slice().copy_from_slice(self.diff.as_slice());
        Ok(())
    }

    fn check_ready(&self, prediction: &Tensor4, target: &Tensor4) -> Result<Shape4, LossError> {
        let configured = self.configured.ok_or(LossError::NotConfigured)?;
        if prediction.shape != configured || target.shape != configured {
            return Err(LossError::ShapeMismatch {
                prediction: prediction.shape,
                target: target.shape,
            });
        }
        Ok(configured)
    }

    /// Renders and presents the diagnostic overlays for one image, then
    /// blocks on the sink's acknowledgement. Degrades to logged warnings on
    /// any failure; never alters the loss value or gradient state.
    fn visualize(
        &mut self,
        frame: &mut VisualizationFrame,
        loss_so_far: f64,
        context: Option<&Tensor4>,
        image_index: usize,
    ) {
        debug!("image {}: accumulated loss {}", image_index, loss_so_far);

        let size = self.options.window_size;
        let composed = match overlay::compose(
            &frame.predicted,
            &frame.ground_truth,
            &frame.diff,
            size,
        ) {
            Ok(composed) => composed,
            Err(e) => {
                warn!("visualization skipped: {}", e);
                return;
            }
        };
        frame.gt_peak = Some(composed.gt_peak);
        frame.pred_peak = Some(composed.pred_peak);

        if let Err(e) = self.sink.show("overlay", &composed.image) {
            warn!("display sink failed: {}", e);
        }

        if let Some(context) = context {
            match overlay::compose_context(
                context,
                image_index,
                composed.gt_peak,
                composed.pred_peak,
                size,
            ) {
                Ok(image) => {
                    if let Err(e) = self.sink.show("context", &image) {
                        warn!("display sink failed: {}", e);
                    }
                }
                Err(e) => warn!("context visualization skipped: {}", e),
            }
        }

        self.sink.wait_for_acknowledgement();
    }
}

impl Default for HeatmapLoss {
    fn default() -> Self {
        HeatmapLoss::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(num: usize, channels: usize, height: usize, width: usize) -> Shape4 {
        Shape4::new(num, channels, height, width)
    }

    /// N=1, C=1, 2x2 grid: prediction [[1,2],[3,4]], target all ones.
    /// Raw squared-difference sum 0+1+4+9 = 14; normalized 14/4 = 3.5.
    fn worked_example() -> (Tensor4, Tensor4) {
        let s = shape(1, 1, 2, 2);
        (
            Tensor4::from_data(s, vec![1.0, 2.0, 3.0, 4.0]),
            Tensor4::from_data(s, vec![1.0, 1.0, 1.0, 1.0]),
        )
    }

    /// Deterministic pseudo-data covering negatives and fractions.
    fn pseudo_tensor(s: Shape4, phase: f64) -> Tensor4 {
        let data = (0..s.count())
            .map(|i| (i as f64 * 0.37 + phase).sin() * 2.0)
            .collect();
        Tensor4::from_data(s, data)
    }

    fn configured(pred: &Tensor4, target: &Tensor4) -> HeatmapLoss {
        let mut engine = HeatmapLoss::new();
        engine.configure(pred.shape, target.shape).unwrap();
        engine
    }

    #[test]
    fn forward_matches_worked_example() {
        let (pred, target) = worked_example();
        let mut engine = configured(&pred, &target);
        let loss = engine.forward(&pred, &target, None).unwrap();
        assert!((loss - 3.5).abs() < 1e-12);
    }

    #[test]
    fn forward_matches_double_precision_reference() {
        let s = shape(3, 4, 5, 6);
        let pred = pseudo_tensor(s, 0.0);
        let target = pseudo_tensor(s, 1.3);

        let reference: f64 = pred
            .as_slice()
            .iter()
            .zip(target.as_slice().iter())
            .map(|(p, t)| (p - t) * (p - t))
            .sum::<f64>()
            / s.count() as f64;

        let mut engine = configured(&pred, &target);
        let loss = engine.forward(&pred, &target, None).unwrap();
        assert!((loss - reference).abs() < 1e-9);
    }

    #[test]
    fn forward_is_deterministic() {
        let s = shape(2, 3, 4, 4);
        let pred = pseudo_tensor(s, 0.0);
        let target = pseudo_tensor(s, 0.7);
        let mut engine = configured(&pred, &target);
        let a = engine.forward(&pred, &target, None).unwrap();
        let b = engine.forward(&pred, &target, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn backward_writes_raw_difference_to_both_buffers() {
        let (pred, target) = worked_example();
        let mut engine = configured(&pred, &target);

        let mut grad_pred = Tensor4::zeros(pred.shape);
        let mut grad_target = Tensor4::zeros(pred.shape);
        engine.backward(&pred, &target, &mut grad_pred, &mut grad_target).unwrap();

        // Unnormalized, unscaled: exactly prediction - target, bit for bit.
        assert_eq!(grad_pred.as_slice(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(grad_target.as_slice(), grad_pred.as_slice());
    }

    #[test]
    fn backward_matches_reference_subtraction_bitwise() {
        let s = shape(2, 3, 4, 5);
        let pred = pseudo_tensor(s, 0.2);
        let target = pseudo_tensor(s, 2.1);
        let mut engine = configured(&pred, &target);

        let mut grad_pred = Tensor4::zeros(s);
        let mut grad_target = Tensor4::zeros(s);
        engine.backward(&pred, &target, &mut grad_pred, &mut grad_target).unwrap();

        let reference: Vec<f64> = pred
            .as_slice()
            .iter()
            .zip(target.as_slice().iter())
            .map(|(p, t)| p - t)
            .collect();
        assert_eq!(grad_pred.as_slice(), reference.as_slice());
        assert_eq!(grad_target.as_slice(), reference.as_slice());
    }

    #[test]
    fn configure_rejects_channel_mismatch() {
        let mut engine = HeatmapLoss::new();
        let err = engine
            .configure(shape(1, 3, 4, 4), shape(1, 2, 4, 4))
            .unwrap_err();
        assert!(matches!(err, LossError::ShapeMismatch { .. }));
    }

    #[test]
    fn configure_rejects_out_of_range_visualize_channel() {
        let mut engine = HeatmapLoss::with_options(VisualizeOptions::channel(5));
        let err = engine
            .configure(shape(1, 2, 4, 4), shape(1, 2, 4, 4))
            .unwrap_err();
        assert!(matches!(err, LossError::Configuration(_)));
    }

    #[test]
    fn forward_rejects_zero_sized_dimension() {
        let s = shape(1, 1, 0, 4);
        let pred = Tensor4::zeros(s);
        let target = Tensor4::zeros(s);
        let mut engine = configured(&pred, &target);
        let err = engine.forward(&pred, &target, None).unwrap_err();
        assert_eq!(err, LossError::EmptyInput(s));
    }

    #[test]
    fn unconfigured_engine_is_rejected() {
        let (pred, target) = worked_example();
        let mut engine = HeatmapLoss::new();
        let err = engine.forward(&pred, &target, None).unwrap_err();
        assert_eq!(err, LossError::NotConfigured);
    }

    #[test]
    fn stale_shape_is_rejected_without_reconfiguration() {
        let (pred, target) = worked_example();
        let mut engine = configured(&pred, &target);

        let bigger = shape(1, 1, 3, 3);
        let err = engine
            .forward(&Tensor4::zeros(bigger), &Tensor4::zeros(bigger), None)
            .unwrap_err();
        assert!(matches!(err, LossError::ShapeMismatch { .. }));
    }

    #[test]
    fn backward_rejects_mismatched_gradient_buffer() {
        let (pred, target) = worked_example();
        let mut engine = configured(&pred, &target);

        let mut grad_pred = Tensor4::zeros(shape(1, 1, 2, 3));
        let mut grad_target = Tensor4::zeros(pred.shape);
        let err = engine
            .backward(&pred, &target, &mut grad_pred, &mut grad_target)
            .unwrap_err();
        assert!(matches!(err, LossError::ShapeMismatch { .. }));
    }

    #[test]
    fn visualization_does_not_affect_loss_or_gradients() {
        let s = shape(2, 2, 6, 6);
        let pred = pseudo_tensor(s, 0.4);
        let target = pseudo_tensor(s, 1.9);
        let context = pseudo_tensor(shape(2, 1, 6, 6), 0.9);

        let mut plain = configured(&pred, &target);
        let mut visualizing = HeatmapLoss::with_options(VisualizeOptions::channel(1));
        visualizing.configure(s, s).unwrap();

        let loss_plain = plain.forward(&pred, &target, None).unwrap();
        let loss_vis = visualizing.forward(&pred, &target, Some(&context)).unwrap();
        assert_eq!(loss_plain, loss_vis);

        let mut gp_a = Tensor4::zeros(s);
        let mut gt_a = Tensor4::zeros(s);
        let mut gp_b = Tensor4::zeros(s);
        let mut gt_b = Tensor4::zeros(s);
        plain.backward(&pred, &target, &mut gp_a, &mut gt_a).unwrap();
        visualizing.backward(&pred, &target, &mut gp_b, &mut gt_b).unwrap();
        assert_eq!(gp_a.as_slice(), gp_b.as_slice());
        assert_eq!(gt_a.as_slice(), gt_b.as_slice());

        // Inputs themselves are untouched by the visualizing run.
        assert_eq!(pred, pseudo_tensor(s, 0.4));
        assert_eq!(target, pseudo_tensor(s, 1.9));
    }
}
