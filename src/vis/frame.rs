use serde::{Serialize, Deserialize};

use crate::math::slice::Slice2;

/// Pixel location of a heatmap extremum, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    pub row: usize,
    pub col: usize,
}

impl Peak {
    pub fn new(row: usize, col: usize) -> Peak {
        Peak { row, col }
    }
}

/// Per-image diagnostic capture from a visualized forward pass.
///
/// Holds the predicted heatmap, the ground-truth heatmap, and the per-pixel
/// squared difference for the selected channel, plus the two peak locations
/// once the overlay has been composed. Built transiently per image and
/// discarded after display; `save_json` exists for offline inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationFrame {
    pub predicted: Slice2,
    pub ground_truth: Slice2,
    pub diff: Slice2,
    /// Ground-truth peak in resized display coordinates; set by the overlay
    /// composition step.
    pub gt_peak: Option<Peak>,
    /// Predicted peak in resized display coordinates; set by the overlay
    /// composition step.
    pub pred_peak: Option<Peak>,
}

impl VisualizationFrame {
    pub fn new(height: usize, width: usize) -> VisualizationFrame {
        VisualizationFrame {
            predicted: Slice2::zeros(height, width),
            ground_truth: Slice2::zeros(height, width),
            diff: Slice2::zeros(height, width),
            gt_peak: None,
            pred_peak: None,
        }
    }

    /// Serializes the frame to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a frame from a JSON file previously written by `save_json`.
    pub fn load_json(path: &str) -> std::io::Result<VisualizationFrame> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_frame() {
        let mut frame = VisualizationFrame::new(2, 2);
        frame.predicted.set(0, 1, 0.5);
        frame.diff.set(1, 0, 0.25);
        frame.gt_peak = Some(Peak::new(3, 4));

        let path = std::env::temp_dir().join(format!("hematite-frame-{}.json", std::process::id()));
        let path = path.to_str().unwrap().to_owned();
        frame.save_json(&path).unwrap();
        let loaded = VisualizationFrame::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, frame);
    }
}
