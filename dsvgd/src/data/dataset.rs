use std::ops::Range;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::{Result, SamplerErr};

/// A binary classification dataset held in memory.
///
/// Rows of `xs` are feature vectors and `ts` holds one label per row,
/// always `-1.0` or `+1.0`.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    xs: Array2<f32>,
    ts: Array1<f32>,
}

impl InMemoryDataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Errors
    /// `InvalidConfig` if the dataset is empty, has no features or a label is not `±1`,
    /// `ShapeMismatch` if `xs` and `ts` disagree on the row count.
    pub fn new(xs: Array2<f32>, ts: Array1<f32>) -> Result<Self> {
        if xs.nrows() != ts.len() {
            return Err(SamplerErr::ShapeMismatch {
                what: "labels",
                got: ts.len(),
                expected: xs.nrows(),
            });
        }

        if xs.nrows() == 0 || xs.ncols() == 0 {
            return Err(SamplerErr::InvalidConfig(
                "dataset must have at least one row and one feature".into(),
            ));
        }

        if let Some(i) = ts.iter().position(|&t| t != 1.0 && t != -1.0) {
            return Err(SamplerErr::InvalidConfig(format!(
                "label at row {i} is {}, labels must be -1 or +1",
                ts[i]
            )));
        }

        Ok(Self { xs, ts })
    }

    /// Creates a dataset from row-major feature rows.
    ///
    /// # Errors
    /// `ShapeMismatch` if the rows are ragged, plus everything `new` rejects.
    pub fn from_rows(rows: &[Vec<f32>], labels: Vec<f32>) -> Result<Self> {
        let ncols = rows.first().map(Vec::len).unwrap_or_default();

        if let Some(row) = rows.iter().find(|row| row.len() != ncols) {
            return Err(SamplerErr::ShapeMismatch {
                what: "feature row",
                got: row.len(),
                expected: ncols,
            });
        }

        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let xs = Array2::from_shape_vec((rows.len(), ncols), flat)
            .map_err(|e| SamplerErr::InvalidConfig(e.to_string()))?;

        Self::new(xs, Array1::from(labels))
    }

    /// Samples a dataset from a logistic model with known `weights`.
    ///
    /// Features are standard normal and `P(t = +1 | x) = sigmoid(x . weights)`.
    pub fn synthetic<R: Rng>(rng: &mut R, samples: usize, weights: &[f32]) -> Result<Self> {
        let weights = ArrayView1::from(weights);
        let xs: Array2<f32> = Array2::from_shape_simple_fn((samples, weights.len()), || {
            StandardNormal.sample(&mut *rng)
        });

        let ts = xs
            .rows()
            .into_iter()
            .map(|x| {
                let p = 1.0 / (1.0 + (-x.dot(&weights)).exp());
                if rng.random::<f32>() < p { 1.0 } else { -1.0 }
            })
            .collect();

        Self::new(xs, ts)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.xs.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.nrows() == 0
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.xs.ncols()
    }

    #[inline]
    pub fn xs(&self) -> ArrayView2<'_, f32> {
        self.xs.view()
    }

    #[inline]
    pub fn ts(&self) -> ArrayView1<'_, f32> {
        self.ts.view()
    }

    /// Borrowed view over the rows in `range` (panics if out of bounds).
    pub fn rows(&self, range: Range<usize>) -> (ArrayView2<'_, f32>, ArrayView1<'_, f32>) {
        let xs = self.xs.slice(s![range.clone(), ..]);
        let ts = self.ts.slice(s![range]);
        (xs, ts)
    }

    /// Rows pre-multiplied by their label, `t_i * x_i`.
    pub fn signed_rows(&self, range: Range<usize>) -> Array2<f32> {
        let (xs, ts) = self.rows(range);
        &xs * &ts.insert_axis(Axis(1))
    }
}
