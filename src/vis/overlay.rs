use image::{Rgb, RgbImage};
use log::debug;

use crate::error::LossError;
use crate::math::slice::Slice2;
use crate::math::tensor::Tensor4;
use crate::vis::frame::Peak;
use crate::vis::prep::{find_extrema, prepare_for_display};

/// Rendered diagnostic image, 8-bit RGB.
pub type OverlayImage = RgbImage;

/// Ground-truth marker: filled green circle, radius 5.
const GT_MARKER: (i64, Rgb<u8>) = (5, Rgb([0, 255, 0]));
/// Prediction marker: filled red circle, radius 3.
const PRED_MARKER: (i64, Rgb<u8>) = (3, Rgb([255, 0, 0]));

/// Gain applied to 3-channel context intensities stored on a 0..255 scale.
const CONTEXT_RGB_GAIN: f64 = 4.0;

/// Result of [`compose`]: the marked-up overlay, the resized per-pixel loss
/// view, and the two peak locations (reused by [`compose_context`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub image: OverlayImage,
    pub diff_view: Slice2,
    pub gt_peak: Peak,
    pub pred_peak: Peak,
}

/// Builds the diagnostic overlay for one image.
///
/// The predicted slice is replicated across all three channels to form the
/// overlay base; all four buffers (predicted, ground truth, per-pixel loss,
/// overlay) go through [`prepare_for_display`]; the ground-truth and
/// prediction peaks are located on the *resized* views; and the two peak
/// markers are drawn onto the overlay.
///
/// Reads its inputs only; never alters loss or gradient state.
pub fn compose(
    predicted: &Slice2,
    ground_truth: &Slice2,
    diff: &Slice2,
    size: u32,
) -> Result<Overlay, LossError> {
    if predicted.is_empty() || ground_truth.is_empty() || diff.is_empty() || size == 0 {
        return Err(LossError::Configuration(format!(
            "zero-sized display buffer ({}x{} heatmap, {} px window)",
            predicted.rows, predicted.cols, size
        )));
    }

    let pred_view = prepare_for_display(predicted, size);
    let gt_view = prepare_for_display(ground_truth, size);
    let diff_view = prepare_for_display(diff, size);

    let gt = find_extrema(&gt_view).expect("non-empty view");
    debug!("gt min: {}  max: {}", gt.min_value, gt.max_value);
    let pred = find_extrema(&pred_view).expect("non-empty view");
    debug!("prediction min: {}  max: {}", pred.min_value, pred.max_value);

    // Overlay base: the prediction replicated across channels.
    let mut image = gray_to_rgb(&pred_view);
    draw_filled_circle(&mut image, gt.max, GT_MARKER.0, GT_MARKER.1);
    draw_filled_circle(&mut image, pred.max, PRED_MARKER.0, PRED_MARKER.1);

    Ok(Overlay {
        image,
        diff_view,
        gt_peak: gt.max,
        pred_peak: pred.max,
    })
}

/// Builds the context overlay: the original input image (or any other
/// side-channel tensor) with the same two peak markers drawn on top, so the
/// true and predicted peaks can be inspected against the input.
///
/// The context tensor must be grayscale (1 channel, intensities on a 0..1
/// scale) or RGB (3 channels, intensities on a 0..255 scale, displayed with
/// a fixed x4 gain and the channel order swapped for the display surface).
pub fn compose_context(
    context: &Tensor4,
    image_index: usize,
    gt_peak: Peak,
    pred_peak: Peak,
    size: u32,
) -> Result<OverlayImage, LossError> {
    let shape = context.shape;
    debug!("context extents: {}", shape);
    if shape.is_empty() || size == 0 {
        return Err(LossError::EmptyInput(shape));
    }

    let mut image = match shape.channels {
        1 => {
            let plane = channel_plane(context, image_index, 0);
            gray_to_rgb(&prepare_for_display(&plane, size))
        }
        3 => {
            let scaled: Vec<Slice2> = (0..3)
                .map(|c| {
                    channel_plane(context, image_index, c)
                        .map(|v| CONTEXT_RGB_GAIN * v / 255.0)
                })
                .collect();
            let views: Vec<Slice2> = scaled
                .iter()
                .map(|plane| prepare_for_display(plane, size))
                .collect();
            // Swapped channel order for the display surface.
            merge_rgb(&views[2], &views[1], &views[0])
        }
        c => return Err(LossError::InvalidChannelCount(c)),
    };

    draw_filled_circle(&mut image, gt_peak, GT_MARKER.0, GT_MARKER.1);
    draw_filled_circle(&mut image, pred_peak, PRED_MARKER.0, PRED_MARKER.1);
    Ok(image)
}

/// Copies one (image, channel) plane out of a tensor.
fn channel_plane(tensor: &Tensor4, image_index: usize, channel: usize) -> Slice2 {
    let mut plane = Slice2::zeros(tensor.shape.height, tensor.shape.width);
    for row in 0..tensor.shape.height {
        for col in 0..tensor.shape.width {
            plane.set(row, col, tensor.at(image_index, channel, row, col));
        }
    }
    plane
}

/// Quantizes a unit-scale intensity to 8 bits, clamping out-of-range values.
fn to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Replicates a single-channel view across all three channels.
fn gray_to_rgb(view: &Slice2) -> OverlayImage {
    RgbImage::from_fn(view.cols as u32, view.rows as u32, |x, y| {
        let v = to_u8(view.get(y as usize, x as usize));
        Rgb([v, v, v])
    })
}

/// Merges three same-size views into one RGB image.
fn merge_rgb(r: &Slice2, g: &Slice2, b: &Slice2) -> OverlayImage {
    assert_eq!(r.rows, g.rows);
    assert_eq!(r.rows, b.rows);
    assert_eq!(r.cols, g.cols);
    assert_eq!(r.cols, b.cols);
    RgbImage::from_fn(r.cols as u32, r.rows as u32, |x, y| {
        let (row, col) = (y as usize, x as usize);
        Rgb([
            to_u8(r.get(row, col)),
            to_u8(g.get(row, col)),
            to_u8(b.get(row, col)),
        ])
    })
}

/// Draws a filled circle of `radius` pixels centered on `center`, clipped
/// to the image bounds.
fn draw_filled_circle(image: &mut OverlayImage, center: Peak, radius: i64, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let x = center.col as i64 + dx;
            let y = center.row as i64 + dy;
            if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
