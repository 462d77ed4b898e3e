use std::{f32::consts::PI, ops::Range, sync::Arc};

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Zip, s};

use super::LogDensity;
use crate::{
    Result,
    data::{InMemoryDataset, ShardSpec},
};

/// Posterior of a Bayesian logistic regression restricted to one shard of the data.
///
/// A particle is `[log(alpha), w_1, .., w_p]` where `alpha` is the prior precision of
/// the weights. The density combines
/// - `alpha ~ Gamma(1, 1)`,
/// - `w | alpha ~ N(0, I / alpha)`,
/// - `t_i | x_i, w ~ Bernoulli(sigmoid(t_i * x_i . w))` for the rows of the shard.
#[derive(Debug, Clone)]
pub struct LogisticPosterior {
    dataset: Arc<InMemoryDataset>,
    shard: ShardSpec,
    range: Range<usize>,
    // Rows of the shard scaled by their label, `t_i * x_i`.
    signed: Array2<f32>,
}

impl LogisticPosterior {
    /// Binds the posterior to the rows `shard` owns in `dataset`.
    ///
    /// # Errors
    /// `InvalidConfig` if the dataset has fewer rows than there are shards.
    pub fn new(dataset: Arc<InMemoryDataset>, shard: ShardSpec) -> Result<Self> {
        let range = shard.range(dataset.len())?;
        let signed = dataset.signed_rows(range.clone());

        Ok(Self {
            dataset,
            shard,
            range,
            signed,
        })
    }

    #[inline]
    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    /// The dataset rows this posterior is conditioned on.
    #[inline]
    pub fn shard_range(&self) -> Range<usize> {
        self.range.clone()
    }

    #[inline]
    pub fn dataset(&self) -> &InMemoryDataset {
        &self.dataset
    }

    fn margins(&self, w: ArrayView1<f32>) -> Array1<f32> {
        self.signed.dot(&w)
    }
}

impl LogDensity for LogisticPosterior {
    fn dim(&self) -> usize {
        self.dataset.n_features() + 1
    }

    fn log_density(&self, x: ArrayView1<f32>) -> f32 {
        let log_alpha = x[0];
        let alpha = log_alpha.exp();
        let w = x.slice(s![1..]);
        let p = w.len() as f32;

        let log_prior_alpha = -alpha;
        let log_prior_w = -0.5 * p * (2.0 * PI).ln() + 0.5 * p * log_alpha - 0.5 * alpha * w.dot(&w);
        let log_lik: f32 = self.margins(w).iter().map(|&z| -softplus(-z)).sum();

        log_prior_alpha + log_prior_w + log_lik
    }

    fn score(&self, x: ArrayView1<f32>, mut grad: ArrayViewMut1<f32>) {
        let alpha = x[0].exp();
        let w = x.slice(s![1..]);
        let p = w.len() as f32;

        grad[0] = -alpha + 0.5 * p - 0.5 * alpha * w.dot(&w);

        // d/dw log sigmoid(z_i) = sigmoid(-z_i) * t_i * x_i
        let weights = self.margins(w).mapv(|z| sigmoid(-z));
        let lik_grad = self.signed.t().dot(&weights);

        Zip::from(grad.slice_mut(s![1..]))
            .and(w)
            .and(&lik_grad)
            .for_each(|g, &w, &l| *g = -alpha * w + l);
    }
}

/// `ln(1 + exp(u))` without overflow for large `u`.
fn softplus(u: f32) -> f32 {
    u.max(0.0) + (-u.abs()).exp().ln_1p()
}

fn sigmoid(u: f32) -> f32 {
    if u >= 0.0 {
        1.0 / (1.0 + (-u).exp())
    } else {
        let e = u.exp();
        e / (1.0 + e)
    }
}
