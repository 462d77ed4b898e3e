use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

use super::LogDensity;

/// Gaussian target with identity covariance.
#[derive(Debug, Clone)]
pub struct IsotropicGaussian {
    mean: Array1<f32>,
}

impl IsotropicGaussian {
    pub fn new(mean: Array1<f32>) -> Self {
        Self { mean }
    }

    pub fn standard(dim: usize) -> Self {
        Self::new(Array1::zeros(dim))
    }
}

impl LogDensity for IsotropicGaussian {
    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn log_density(&self, x: ArrayView1<f32>) -> f32 {
        let diff = &x - &self.mean;
        -0.5 * diff.dot(&diff)
    }

    fn score(&self, x: ArrayView1<f32>, grad: ArrayViewMut1<f32>) {
        Zip::from(grad)
            .and(x)
            .and(&self.mean)
            .for_each(|g, &x, &m| *g = m - x);
    }
}
