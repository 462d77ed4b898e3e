use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::{
    ExchangeMode, Kernel, LogDensity, ParticleRow, Particles, Result, SamplerErr,
    comm::Communicator, transport,
};

/// The communicator together with its scratch buffers.
struct Exchanger<C> {
    comm: C,
    send_buf: Vec<f32>,
    recv_buf: Vec<f32>,
}

impl<C: Communicator> Exchanger<C> {
    /// All-gathers `rows` from every rank and returns them stacked in rank order.
    async fn gather_rows(&mut self, step: usize, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let (n, width) = rows.dim();
        let world_size = self.comm.world_size();

        self.send_buf.clear();
        self.send_buf.extend(rows.iter());
        self.comm
            .all_gather(&self.send_buf, &mut self.recv_buf)
            .await?;

        let gathered = std::mem::take(&mut self.recv_buf);
        let got = gathered.len();

        Array2::from_shape_vec((world_size * n, width), gathered).map_err(|_| {
            SamplerErr::PayloadLengthMismatch {
                step,
                got,
                expected: world_size * n * width,
            }
        })
    }
}

/// Stein variational gradient descent over a population partitioned across workers.
///
/// Each worker owns `particles` and a log-density bound to its shard of the data. On
/// every step, depending on the `ExchangeMode`, workers first share their positions
/// (and scores) and then move their own particles along the kernelized Stein direction
/// computed against the resulting population.
pub struct DistSampler<L, K, C> {
    exchanger: Exchanger<C>,
    log_density: L,
    kernel: K,
    particles: Particles,
    exchange: ExchangeMode,
    include_wasserstein: bool,
    steps: usize,
    wasserstein: Vec<f32>,
}

impl<L, K, C> DistSampler<L, K, C>
where
    L: LogDensity,
    K: Kernel,
    C: Communicator,
{
    /// Creates a new `DistSampler`.
    ///
    /// # Args
    /// * `comm` - The process group, which also defines this worker's rank and the shard count.
    /// * `log_density` - The target bound to this worker's shard.
    /// * `kernel` - The interaction kernel.
    /// * `particles` - The initial local population.
    /// * `exchange` - What to share with other workers on each step.
    /// * `include_wasserstein` - Whether to record the distance to the global population.
    ///
    /// # Errors
    /// `ShapeMismatch` if the particles don't live in the density's space,
    /// `InvalidConfig` if the communicator's rank is out of range.
    pub fn new(
        comm: C,
        log_density: L,
        kernel: K,
        particles: Particles,
        exchange: ExchangeMode,
        include_wasserstein: bool,
    ) -> Result<Self> {
        if particles.dim() != log_density.dim() {
            return Err(SamplerErr::ShapeMismatch {
                what: "particle dimension",
                got: particles.dim(),
                expected: log_density.dim(),
            });
        }

        if comm.rank() >= comm.world_size() {
            return Err(SamplerErr::InvalidConfig(format!(
                "rank {} is out of range for {} shard(s)",
                comm.rank(),
                comm.world_size()
            )));
        }

        info!(
            rank = comm.rank(),
            num_shards = comm.world_size(),
            nparticles = particles.len(),
            exchange_particles = exchange.exchanges_particles(),
            exchange_scores = exchange.exchanges_scores(),
            wasserstein = include_wasserstein;
            "sampler created"
        );

        Ok(Self {
            exchanger: Exchanger {
                comm,
                send_buf: Vec::new(),
                recv_buf: Vec::new(),
            },
            log_density,
            kernel,
            particles,
            exchange,
            include_wasserstein,
            steps: 0,
            wasserstein: Vec::new(),
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.exchanger.comm.rank()
    }

    #[inline]
    pub fn num_shards(&self) -> usize {
        self.exchanger.comm.world_size()
    }

    #[inline]
    pub fn exchange(&self) -> ExchangeMode {
        self.exchange
    }

    /// The current local population.
    #[inline]
    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    /// The amount of completed steps.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The distance to the global population recorded on each step, if enabled.
    #[inline]
    pub fn wasserstein(&self) -> &[f32] {
        &self.wasserstein
    }

    /// The local population as result rows tagged with `timestep`.
    pub fn rows(&self, timestep: usize) -> Vec<ParticleRow> {
        self.particles.rows(timestep, self.rank())
    }

    pub fn into_particles(self) -> Particles {
        self.particles
    }

    /// Runs one SVGD update of the local particles.
    ///
    /// Blocks on the group when the exchange mode, or the Wasserstein tracking, needs data
    /// from the other workers. The population is only modified if the whole update is
    /// finite.
    ///
    /// # Args
    /// * `stepsize` - The learning rate, a zero step leaves the particles in place.
    /// * `h` - The kernel bandwidth.
    ///
    /// # Errors
    /// `InvalidConfig` on a negative step or non-positive bandwidth, `NonFinite` if a
    /// local score or the update is not finite, `NonFiniteRemote` if a peer's particle
    /// scores non-finite here, and any communication failure.
    pub async fn step(&mut self, stepsize: f32, h: f32) -> Result<()> {
        let step = self.steps;

        if !(stepsize.is_finite() && stepsize >= 0.0) {
            return Err(SamplerErr::InvalidConfig(format!(
                "stepsize must be finite and non-negative, got {stepsize}"
            )));
        }

        if !(h.is_finite() && h > 0.0) {
            return Err(SamplerErr::InvalidConfig(format!(
                "bandwidth must be finite and positive, got {h}"
            )));
        }

        let local = self.particles.view();
        let local_scores = scores(&self.log_density, local, step)?;
        let solo = self.exchanger.comm.world_size() == 1;

        let (phi, union) = match self.exchange {
            _ if solo => (
                svgd_direction(&self.kernel, local, local, local_scores.view(), h),
                None,
            ),
            ExchangeMode::Partitions => {
                let union = if self.include_wasserstein {
                    Some(self.exchanger.gather_rows(step, local).await?)
                } else {
                    None
                };

                let phi = svgd_direction(&self.kernel, local, local, local_scores.view(), h);
                (phi, union)
            }
            ExchangeMode::AllParticles => {
                let union = self.exchanger.gather_rows(step, local).await?;
                let union_scores = score_union(
                    &self.log_density,
                    union.view(),
                    self.exchanger.comm.rank(),
                    local_scores.view(),
                    step,
                )?;

                let phi =
                    svgd_direction(&self.kernel, local, union.view(), union_scores.view(), h);
                (phi, Some(union))
            }
            ExchangeMode::AllScores => {
                let packed = ndarray::concatenate(Axis(1), &[local, local_scores.view()])
                    .map_err(|_| SamplerErr::ShapeMismatch {
                        what: "score rows",
                        got: local_scores.nrows(),
                        expected: local.nrows(),
                    })?;
                let gathered = self.exchanger.gather_rows(step, packed.view()).await?;
                let (positions, union_scores) = gathered.view().split_at(Axis(1), local.ncols());

                let phi = svgd_direction(&self.kernel, local, positions, union_scores, h);
                (phi, Some(positions.to_owned()))
            }
        };

        if let Some(index) = first_non_finite_row(phi.view()) {
            return Err(SamplerErr::NonFinite {
                step,
                what: "update direction",
                index,
            });
        }

        let updated = &local + &(phi * stepsize);
        if let Some(index) = first_non_finite_row(updated.view()) {
            return Err(SamplerErr::NonFinite {
                step,
                what: "position",
                index,
            });
        }

        if self.include_wasserstein {
            let union = union.as_ref().map_or(local, |u| u.view());
            let distance = transport::wasserstein2(local, union)?;

            debug!(rank = self.rank(), step = step, wasserstein = distance; "transport distance");
            self.wasserstein.push(distance);
        }

        self.particles.replace(updated);
        self.steps += 1;

        debug!(rank = self.rank(), step = step, mode = self.exchange.as_str(); "svgd step done");
        Ok(())
    }

    /// Waits for every worker of the group to finish.
    pub async fn finish(&mut self) -> Result<()> {
        self.exchanger.comm.finish().await
    }
}

/// Scores every row of `xs` under `log_density`.
fn scores<L: LogDensity>(log_density: &L, xs: ArrayView2<f32>, step: usize) -> Result<Array2<f32>> {
    let mut out = Array2::zeros(xs.raw_dim());

    for (x, grad) in xs.rows().into_iter().zip(out.rows_mut()) {
        log_density.score(x, grad);
    }

    match first_non_finite_row(out.view()) {
        Some(index) => Err(SamplerErr::NonFinite {
            step,
            what: "score",
            index,
        }),
        None => Ok(out),
    }
}

/// Scores the gathered `union` in rank-sized blocks, reusing `own_scores` for the
/// block at `rank`.
///
/// # Errors
/// `NonFiniteRemote` naming the owner of the first particle with a non-finite score.
fn score_union<L: LogDensity>(
    log_density: &L,
    union: ArrayView2<f32>,
    rank: usize,
    own_scores: ArrayView2<f32>,
    step: usize,
) -> Result<Array2<f32>> {
    let n = own_scores.nrows();
    let mut out = Array2::zeros(union.raw_dim());

    let blocks = union
        .axis_chunks_iter(Axis(0), n)
        .zip(out.axis_chunks_iter_mut(Axis(0), n))
        .enumerate();

    for (owner, (xs, mut grads)) in blocks {
        if owner == rank {
            grads.assign(&own_scores);
            continue;
        }

        for (x, grad) in xs.rows().into_iter().zip(grads.rows_mut()) {
            log_density.score(x, grad);
        }

        if let Some(index) = first_non_finite_row(grads.view()) {
            return Err(SamplerErr::NonFiniteRemote {
                step,
                rank: owner,
                index,
            });
        }
    }

    Ok(out)
}

/// The Stein direction for every row of `xs` against the population `ys`:
///
/// `phi(x) = 1/|ys| * sum_y [k(y, x) * score(y) + ∇_y k(y, x)]`
fn svgd_direction<K: Kernel>(
    kernel: &K,
    xs: ArrayView2<f32>,
    ys: ArrayView2<f32>,
    y_scores: ArrayView2<f32>,
    h: f32,
) -> Array2<f32> {
    let mut phi = Array2::zeros(xs.raw_dim());
    let mut repulsion = Array1::zeros(xs.ncols());
    let norm = ys.nrows() as f32;

    for (x, mut phi_x) in xs.rows().into_iter().zip(phi.rows_mut()) {
        for (y, score) in ys.rows().into_iter().zip(y_scores.rows()) {
            let k = kernel.grad_first(y, x, h, repulsion.view_mut());
            phi_x.scaled_add(k, &score);
            phi_x += &repulsion;
        }

        phi_x /= norm;
    }

    phi
}

fn first_non_finite_row(xs: ArrayView2<f32>) -> Option<usize> {
    xs.rows()
        .into_iter()
        .position(|row| row.iter().any(|x| !x.is_finite()))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{IsotropicGaussian, Rbf};

    #[test]
    fn direction_of_a_lone_particle_is_its_score() {
        let xs = array![[0.5f32, -1.0]];
        let score = array![[-0.5f32, 1.0]];

        let phi = svgd_direction(&Rbf, xs.view(), xs.view(), score.view(), 1.0);
        assert_eq!(phi, score);
    }

    #[test]
    fn repulsion_pushes_particles_apart() {
        let xs = array![[0.0f32], [1.0]];
        let zero = Array2::zeros((2, 1));

        let phi = svgd_direction(&Rbf, xs.view(), xs.view(), zero.view(), 1.0);
        assert!(phi[[0, 0]] < 0.0);
        assert!(phi[[1, 0]] > 0.0);
        assert!((phi[[0, 0]] + phi[[1, 0]]).abs() < 1e-7);
    }

    #[test]
    fn union_scores_reuse_the_own_block() {
        let target = IsotropicGaussian::standard(1);
        let union = array![[1.0f32], [2.0], [3.0], [4.0]];
        let own = array![[7.0f32], [8.0]];

        let out = score_union(&target, union.view(), 1, own.view(), 0).unwrap();
        assert_eq!(out, array![[-1.0f32], [-2.0], [7.0], [8.0]]);
    }

    #[test]
    fn union_scores_name_the_owner_of_a_bad_particle() {
        let target = IsotropicGaussian::standard(1);
        let union = array![[0.0f32], [0.0], [0.0], [f32::INFINITY]];
        let own = array![[0.0f32], [0.0]];

        let err = score_union(&target, union.view(), 0, own.view(), 4).unwrap_err();
        assert!(matches!(
            err,
            SamplerErr::NonFiniteRemote {
                step: 4,
                rank: 1,
                index: 1
            }
        ));
    }

    #[test]
    fn scores_reject_non_finite_values() {
        let target = IsotropicGaussian::standard(2);
        let xs = array![[0.0f32, 1.0], [f32::INFINITY, 0.0]];

        let err = scores(&target, xs.view(), 3).unwrap_err();
        assert!(matches!(
            err,
            SamplerErr::NonFinite {
                step: 3,
                what: "score",
                index: 1
            }
        ));
    }
}
