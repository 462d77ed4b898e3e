use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;

use crate::{Result, SamplerErr};

/// A worker's particle population.
///
/// Row `i` is the same logical particle for the whole run. When populations are
/// exchanged they are appended in rank order, so rank `r`'s rows occupy
/// `r * len() .. (r + 1) * len()` of the union.
#[derive(Debug, Clone, PartialEq)]
pub struct Particles {
    data: Array2<f32>,
}

/// One particle at one point of the run, as handed to result consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleRow {
    pub timestep: usize,
    pub rank: usize,
    pub index: usize,
    pub value: Vec<f32>,
}

impl Particles {
    /// Wraps a `len x dim` array of positions.
    ///
    /// # Errors
    /// `InvalidConfig` if there are no particles or the particles have no coordinates.
    pub fn new(data: Array2<f32>) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(SamplerErr::InvalidConfig(format!(
                "a population needs at least one particle of at least one dimension, got {:?}",
                data.dim()
            )));
        }

        Ok(Self { data })
    }

    /// Builds a population from row-major positions.
    ///
    /// # Errors
    /// `ShapeMismatch` if `values.len()` is not `len * dim`.
    pub fn from_flat(len: usize, dim: usize, values: Vec<f32>) -> Result<Self> {
        let got = values.len();
        let data = Array2::from_shape_vec((len, dim), values).map_err(|_| {
            SamplerErr::ShapeMismatch {
                what: "flat particles",
                got,
                expected: len * dim,
            }
        })?;

        Self::new(data)
    }

    /// Samples every coordinate of `len` particles from a standard normal.
    pub fn standard_normal<R: Rng>(rng: &mut R, len: NonZeroUsize, dim: NonZeroUsize) -> Self {
        let data = Array2::from_shape_simple_fn((len.get(), dim.get()), || {
            StandardNormal.sample(&mut *rng)
        });

        Self { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// The position of the `i`-th particle (panics if out of bounds).
    #[inline]
    pub fn get(&self, i: usize) -> ArrayView1<'_, f32> {
        self.data.row(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = ArrayView1<'_, f32>> {
        self.data.rows().into_iter()
    }

    /// Whether every coordinate of every particle is a finite number.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// The population as result rows tagged with `timestep` and the owning `rank`.
    pub fn rows(&self, timestep: usize, rank: usize) -> Vec<ParticleRow> {
        self.iter()
            .enumerate()
            .map(|(index, x)| ParticleRow {
                timestep,
                rank,
                index,
                value: x.to_vec(),
            })
            .collect()
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    pub(crate) fn replace(&mut self, data: Array2<f32>) {
        debug_assert_eq!(data.dim(), self.data.dim());
        self.data = data;
    }
}
