use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// A symmetric positive similarity between two particles.
pub trait Kernel {
    /// Evaluates `k(x, y)` under bandwidth `h`.
    fn eval(&self, x: ArrayView1<f32>, y: ArrayView1<f32>, h: f32) -> f32;

    /// Writes `∇_x k(x, y)` into `grad` and returns `k(x, y)`.
    fn grad_first(
        &self,
        x: ArrayView1<f32>,
        y: ArrayView1<f32>,
        h: f32,
        grad: ArrayViewMut1<f32>,
    ) -> f32;
}

/// Gaussian kernel `exp(-|x - y|^2 / h)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rbf;

impl Rbf {
    pub fn new() -> Self {
        Self
    }
}

fn squared_distance(x: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
    Zip::from(x).and(y).fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b))
}

impl Kernel for Rbf {
    fn eval(&self, x: ArrayView1<f32>, y: ArrayView1<f32>, h: f32) -> f32 {
        (-squared_distance(x, y) / h).exp()
    }

    fn grad_first(
        &self,
        x: ArrayView1<f32>,
        y: ArrayView1<f32>,
        h: f32,
        grad: ArrayViewMut1<f32>,
    ) -> f32 {
        let k = self.eval(x, y, h);
        let scale = -2.0 * k / h;

        Zip::from(grad)
            .and(x)
            .and(y)
            .for_each(|g, &a, &b| *g = scale * (a - b));

        k
    }
}
