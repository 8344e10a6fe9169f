use serde::{Serialize, Deserialize};

/// Dense 2D float buffer, row-major. One (image, channel) plane of a
/// [`Tensor4`](crate::math::tensor::Tensor4), as captured for visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice2 {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Slice2 {
    pub fn zeros(rows: usize, cols: usize) -> Slice2 {
        Slice2 {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wraps an existing flat buffer. `data.len()` must equal `rows * cols`.
    pub fn from_data(rows: usize, cols: usize, data: Vec<f64>) -> Slice2 {
        assert_eq!(
            data.len(),
            rows * cols,
            "data length {} does not match {}x{}",
            data.len(),
            rows,
            cols
        );
        Slice2 { rows, cols, data }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows, "row {} out of range ({})", row, self.rows);
        assert!(col < self.cols, "col {} out of range ({})", col, self.cols);
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.rows, "row {} out of range ({})", row, self.rows);
        assert!(col < self.cols, "col {} out of range ({})", col, self.cols);
        self.data[row * self.cols + col] = value;
    }

    pub fn transpose(&self) -> Slice2 {
        let mut res = Slice2::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.set(i, j, self.get(j, i));
            }
        }

        res
    }

    /// Mirrors the buffer along the vertical axis (reverses each row).
    pub fn mirror_cols(&self) -> Slice2 {
        let mut res = Slice2::zeros(self.rows, self.cols);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.set(i, self.cols - 1 - j, self.get(i, j));
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Slice2
    where
        F: Fn(f64) -> f64,
    {
        Slice2::from_data(
            self.rows,
            self.cols,
            self.data.iter().map(|&x| functor(x)).collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
