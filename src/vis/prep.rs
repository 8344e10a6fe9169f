use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use crate::math::slice::Slice2;
use crate::vis::frame::Peak;

/// Global minimum and maximum of a 2D buffer, with their locations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub min: Peak,
    pub min_value: f64,
    pub max: Peak,
    pub max_value: f64,
}

/// Converts a heatmap slice from its storage orientation to the on-screen
/// orientation and resizes it to a `size` x `size` square.
///
/// The transpose + mirror is a fixed coordinate-convention correction
/// (storage addresses (row, col); the display expects the axes swapped and
/// one of them flipped), not a configurable transform. Resampling is
/// bilinear. Pure function of its inputs.
pub fn prepare_for_display(slice: &Slice2, size: u32) -> Slice2 {
    let oriented = slice.transpose().mirror_cols();
    resize_bilinear(&oriented, size, size)
}

/// Interpolated resampling of a 2D buffer to `width` x `height`.
fn resize_bilinear(slice: &Slice2, width: u32, height: u32) -> Slice2 {
    let src: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_fn(
        slice.cols as u32,
        slice.rows as u32,
        |x, y| Luma([slice.get(y as usize, x as usize) as f32]),
    );
    let resized = imageops::resize(&src, width, height, FilterType::Triangle);
    Slice2::from_data(
        height as usize,
        width as usize,
        resized.pixels().map(|p| f64::from(p.0[0])).collect(),
    )
}

/// Location and value of the global maximum. Ties break to the first
/// occurrence in row-major scan order. Returns `None` for an empty buffer.
pub fn find_peak(slice: &Slice2) -> Option<(Peak, f64)> {
    find_extrema(slice).map(|e| (e.max, e.max_value))
}

/// Global minimum and maximum in one row-major scan. Both ties break to the
/// first occurrence. Returns `None` for an empty buffer.
pub fn find_extrema(slice: &Slice2) -> Option<Extrema> {
    if slice.is_empty() {
        return None;
    }

    let mut extrema = Extrema {
        min: Peak::new(0, 0),
        min_value: slice.get(0, 0),
        max: Peak::new(0, 0),
        max_value: slice.get(0, 0),
    };

    for row in 0..slice.rows {
        for col in 0..slice.cols {
            let value = slice.get(row, col);
            if value < extrema.min_value {
                extrema.min = Peak::new(row, col);
                extrema.min_value = value;
            }
            if value > extrema.max_value {
                extrema.max = Peak::new(row, col);
                extrema.max_value = value;
            }
        }
    }

    Some(extrema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_peak_returns_unique_maximum_exactly() {
        let mut s = Slice2::zeros(4, 5);
        s.set(2, 3, 9.5);
        let (peak, value) = find_peak(&s).unwrap();
        assert_eq!(peak, Peak::new(2, 3));
        assert_eq!(value, 9.5);
    }

    #[test]
    fn find_peak_breaks_ties_to_first_in_row_major_order() {
        let mut s = Slice2::zeros(3, 3);
        s.set(0, 2, 1.0);
        s.set(1, 1, 1.0);
        s.set(2, 0, 1.0);
        let (peak, _) = find_peak(&s).unwrap();
        assert_eq!(peak, Peak::new(0, 2));
    }

    #[test]
    fn find_extrema_locates_min_and_max() {
        let mut s = Slice2::from_data(2, 2, vec![0.5, 0.5, 0.5, 0.5]);
        s.set(0, 1, 2.0);
        s.set(1, 0, -1.0);
        let e = find_extrema(&s).unwrap();
        assert_eq!(e.max, Peak::new(0, 1));
        assert_eq!(e.max_value, 2.0);
        assert_eq!(e.min, Peak::new(1, 0));
        assert_eq!(e.min_value, -1.0);
    }

    #[test]
    fn find_peak_on_empty_buffer_is_none() {
        assert!(find_peak(&Slice2::zeros(0, 0)).is_none());
    }

    #[test]
    fn prepare_for_display_is_pure() {
        let mut s = Slice2::zeros(4, 4);
        s.set(1, 2, 1.0);
        s.set(3, 0, 0.5);
        let a = prepare_for_display(&s, 16);
        let b = prepare_for_display(&s, 16);
        assert_eq!(a, b);
    }

    #[test]
    fn prepare_for_display_transposes_and_mirrors() {
        // A hot pixel at storage (row=0, col=1) lands at display
        // (row=1, col=rows-1-0) after the transpose + mirror, with the
        // same-size resize leaving values in place.
        let mut s = Slice2::zeros(3, 3);
        s.set(0, 1, 1.0);
        let view = prepare_for_display(&s, 3);
        let (peak, _) = find_peak(&view).unwrap();
        assert_eq!(peak, Peak::new(1, 2));
    }

    #[test]
    fn prepare_for_display_resizes_to_target() {
        let view = prepare_for_display(&Slice2::zeros(4, 6), 32);
        assert_eq!(view.rows, 32);
        assert_eq!(view.cols, 32);
    }
}
