use std::{env, fs, net::SocketAddr, num::NonZeroUsize, path::Path, str::FromStr};

use dsvgd::{ExchangeMode, InMemoryDataset};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{NodeErr, Result};

const DEFAULT_MASTER_ADDR: &str = "127.0.0.1";
const DEFAULT_MASTER_PORT: u16 = 29500;

/// The training data every rank shards identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DatasetConfig {
    /// Row-major feature rows with one `±1` label each.
    Inline {
        features: Vec<Vec<f32>>,
        labels: Vec<f32>,
    },
    /// Rows sampled from a logistic model with known weights.
    Synthetic {
        samples: usize,
        weights: Vec<f32>,
        seed: u64,
    },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::Synthetic {
            samples: 400,
            weights: vec![1.5, -2.0],
            seed: 42,
        }
    }
}

impl DatasetConfig {
    /// The amount of features per row, as announced by the config.
    pub fn n_features(&self) -> usize {
        match self {
            DatasetConfig::Inline { features, .. } => features.first().map_or(0, Vec::len),
            DatasetConfig::Synthetic { weights, .. } => weights.len(),
        }
    }

    /// Materializes the dataset.
    ///
    /// # Returns
    /// The same rows on every call, which is what lets every rank agree on the shards.
    pub fn build(&self) -> Result<InMemoryDataset> {
        let dataset = match self {
            DatasetConfig::Inline { features, labels } => {
                InMemoryDataset::from_rows(features, labels.clone())?
            }
            DatasetConfig::Synthetic {
                samples,
                weights,
                seed,
            } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                InMemoryDataset::synthetic(&mut rng, *samples, weights)?
            }
        };

        Ok(dataset)
    }
}

/// The parameters of a sampling run, shared by every rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub nparticles: usize,
    pub niter: usize,
    pub stepsize: f32,
    pub exchange: ExchangeMode,
    pub wasserstein: bool,
    pub bandwidth: f32,
    pub seed: u64,
    pub dataset: DatasetConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            nparticles: 10,
            niter: 100,
            stepsize: 1e-3,
            exchange: ExchangeMode::Partitions,
            wasserstein: false,
            bandwidth: 10.0,
            seed: 0,
            dataset: DatasetConfig::default(),
        }
    }
}

impl RunConfig {
    /// Loads the config from the JSON file at `$CONFIG`, or the defaults if unset.
    pub fn from_env() -> Result<Self> {
        match env::var_os("CONFIG") {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses and validates a JSON config, missing fields take their default.
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(raw).map_err(|e| NodeErr::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// `Config` if a count is zero or the step size or bandwidth is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.nparticles == 0 {
            return Err(NodeErr::Config("nparticles must be positive".into()));
        }

        if self.niter == 0 {
            return Err(NodeErr::Config("niter must be positive".into()));
        }

        if !(self.stepsize.is_finite() && self.stepsize > 0.0) {
            return Err(NodeErr::Config(format!(
                "stepsize must be positive, got {}",
                self.stepsize
            )));
        }

        if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
            return Err(NodeErr::Config(format!(
                "bandwidth must be positive, got {}",
                self.bandwidth
            )));
        }

        Ok(())
    }

    pub fn nparticles(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.nparticles)
            .ok_or_else(|| NodeErr::Config("nparticles must be positive".into()))
    }
}

/// Where this process sits in the group, read from `RANK`, `WORLD_SIZE`,
/// `MASTER_ADDR` (an IP address) and `MASTER_PORT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupEnv {
    /// Unset on the launcher, which spawns every rank itself.
    pub rank: Option<usize>,
    pub world_size: NonZeroUsize,
    pub master: SocketAddr,
}

impl GroupEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the group identity out of an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let rank = lookup("RANK").map(|v| parse_var::<usize>("RANK", v)).transpose()?;
        let world_size = match lookup("WORLD_SIZE") {
            Some(v) => parse_var("WORLD_SIZE", v)?,
            None => NonZeroUsize::MIN,
        };

        let addr = lookup("MASTER_ADDR").unwrap_or_else(|| DEFAULT_MASTER_ADDR.to_string());
        let port = match lookup("MASTER_PORT") {
            Some(v) => parse_var("MASTER_PORT", v)?,
            None => DEFAULT_MASTER_PORT,
        };

        let master = format!("{addr}:{port}");
        let master: SocketAddr = master.parse().map_err(|_| NodeErr::InvalidEnv {
            var: "MASTER_ADDR",
            value: addr,
        })?;

        if let Some(rank) = rank.filter(|&rank| rank >= world_size.get()) {
            return Err(NodeErr::InvalidEnv {
                var: "RANK",
                value: rank.to_string(),
            });
        }

        Ok(Self {
            rank,
            world_size,
            master,
        })
    }

    /// Whether this process only spawns and joins the actual ranks.
    pub fn is_launcher(&self) -> bool {
        self.rank.is_none() && self.world_size.get() > 1
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: String) -> Result<T> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(NodeErr::InvalidEnv { var, value }),
    }
}
