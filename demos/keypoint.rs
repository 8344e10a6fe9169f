/// Keypoint heatmap demo for hematite.
///
/// Builds a batch of synthetic gaussian ground-truth heatmaps, perturbs
/// them with noise and a small peak shift to fake a network prediction,
/// then runs the loss forward and backward with visualization enabled.
/// Overlays land as PNGs under target/keypoint-demo/; channel 0 of the
/// first image is additionally dumped as JSON.
///
/// Run with:
///   cargo run --example keypoint

use rand::prelude::*;

use hematite::{
    HeatmapLoss,
    PngDirSink,
    Shape4,
    Slice2,
    Tensor4,
    VisualizationFrame,
    VisualizeOptions,
};
use hematite::vis::prep::find_peak;

const BATCH: usize = 4;
const CHANNELS: usize = 3;
const SIDE: usize = 32;
const SIGMA: f64 = 2.5;

/// Writes a unit-height gaussian bump centered at (peak_row, peak_col)
/// into one channel of `tensor`.
fn write_gaussian(tensor: &mut Tensor4, n: usize, c: usize, peak_row: usize, peak_col: usize) {
    for row in 0..SIDE {
        for col in 0..SIDE {
            let dr = row as f64 - peak_row as f64;
            let dc = col as f64 - peak_col as f64;
            let value = (-(dr * dr + dc * dc) / (2.0 * SIGMA * SIGMA)).exp();
            tensor.set(n, c, row, col, value);
        }
    }
}

/// Extracts one (image, channel) plane as a Slice2.
fn plane(tensor: &Tensor4, n: usize, c: usize) -> Slice2 {
    let mut slice = Slice2::zeros(SIDE, SIDE);
    for row in 0..SIDE {
        for col in 0..SIDE {
            slice.set(row, col, tensor.at(n, c, row, col));
        }
    }
    slice
}

fn main() {
    let mut rng = rand::thread_rng();
    let shape = Shape4::new(BATCH, CHANNELS, SIDE, SIDE);

    // Ground truth: one gaussian bump per channel, away from the borders.
    let mut target = Tensor4::zeros(shape);
    let mut true_peaks = vec![];
    for n in 0..BATCH {
        for c in 0..CHANNELS {
            let peak_row = rng.gen_range(6..SIDE - 6);
            let peak_col = rng.gen_range(6..SIDE - 6);
            write_gaussian(&mut target, n, c, peak_row, peak_col);
            if c == 0 {
                true_peaks.push((peak_row, peak_col));
            }
        }
    }

    // Prediction: the same bumps shifted by up to 3 pixels, plus noise.
    let mut prediction = Tensor4::zeros(shape);
    for n in 0..BATCH {
        for c in 0..CHANNELS {
            let (peak, _) = find_peak(&plane(&target, n, c)).unwrap();
            let shift_row = (peak.row as i64 + rng.gen_range(-3..=3)).clamp(0, SIDE as i64 - 1);
            let shift_col = (peak.col as i64 + rng.gen_range(-3..=3)).clamp(0, SIDE as i64 - 1);
            write_gaussian(&mut prediction, n, c, shift_row as usize, shift_col as usize);
        }
    }
    for value in prediction.as_mut_slice() {
        *value += rng.gen::<f64>() * 0.05;
    }

    // Context: a grayscale "input image" (here just the channel-0 truth).
    let mut context = Tensor4::zeros(Shape4::new(BATCH, 1, SIDE, SIDE));
    for n in 0..BATCH {
        for row in 0..SIDE {
            for col in 0..SIDE {
                context.set(n, 0, row, col, target.at(n, 0, row, col));
            }
        }
    }

    let mut engine = HeatmapLoss::with_options(VisualizeOptions::channel(0))
        .with_sink(Box::new(PngDirSink::new("target/keypoint-demo")));
    engine.configure(shape, shape).expect("shapes match");

    let loss = engine
        .forward(&prediction, &target, Some(&context))
        .expect("forward");
    println!("normalized loss over {BATCH} images: {loss:.6}");

    let mut grad_prediction = Tensor4::zeros(shape);
    let mut grad_target = Tensor4::zeros(shape);
    engine
        .backward(&prediction, &target, &mut grad_prediction, &mut grad_target)
        .expect("backward");
    let grad_max = grad_prediction
        .as_slice()
        .iter()
        .fold(0.0_f64, |acc, g| acc.max(g.abs()));
    println!("max |gradient|: {grad_max:.4}");

    // Peak drift report for channel 0.
    for n in 0..BATCH {
        let (true_peak, _) = find_peak(&plane(&target, n, 0)).unwrap();
        let (pred_peak, _) = find_peak(&plane(&prediction, n, 0)).unwrap();
        println!(
            "image {n}: true peak ({}, {})  predicted peak ({}, {})  planted ({}, {})",
            true_peak.row, true_peak.col, pred_peak.row, pred_peak.col,
            true_peaks[n].0, true_peaks[n].1
        );
    }

    // Dump channel 0 of the first image for offline inspection.
    let mut frame = VisualizationFrame::new(SIDE, SIDE);
    frame.predicted = plane(&prediction, 0, 0);
    frame.ground_truth = plane(&target, 0, 0);
    for row in 0..SIDE {
        for col in 0..SIDE {
            let diff = frame.predicted.get(row, col) - frame.ground_truth.get(row, col);
            frame.diff.set(row, col, diff * diff);
        }
    }
    frame.gt_peak = find_peak(&frame.ground_truth).map(|(p, _)| p);
    frame.pred_peak = find_peak(&frame.predicted).map(|(p, _)| p);
    frame
        .save_json("target/keypoint-demo/frame-0000.json")
        .expect("frame dump");
    println!("overlays and frame dump written to target/keypoint-demo/");
}
