mod gaussian;
mod logistic;

use ndarray::{ArrayView1, ArrayViewMut1};

pub use gaussian::IsotropicGaussian;
pub use logistic::LogisticPosterior;

/// An unnormalized, differentiable log-density over particle positions.
pub trait LogDensity {
    /// Dimension of the particles this density is defined on.
    fn dim(&self) -> usize;

    /// Evaluates the log-density at `x`, up to an additive constant.
    fn log_density(&self, x: ArrayView1<f32>) -> f32;

    /// Writes the gradient of the log-density at `x` into `grad`.
    ///
    /// # Arguments
    /// * `x` - The particle position, of length `dim()`.
    /// * `grad` - The output buffer, of length `dim()`.
    fn score(&self, x: ArrayView1<f32>, grad: ArrayViewMut1<f32>);
}
