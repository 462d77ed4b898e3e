use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::SamplerErr;

/// What crosses worker boundaries on every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeMode {
    /// Nothing, each worker runs an independent sampler on its shard.
    #[default]
    Partitions,
    /// Particle positions, scored by each worker against its own shard.
    AllParticles,
    /// Particle positions together with the score computed by their owner.
    AllScores,
}

impl ExchangeMode {
    pub const ALL: [ExchangeMode; 3] = [
        ExchangeMode::Partitions,
        ExchangeMode::AllParticles,
        ExchangeMode::AllScores,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeMode::Partitions => "partitions",
            ExchangeMode::AllParticles => "all_particles",
            ExchangeMode::AllScores => "all_scores",
        }
    }

    pub fn exchanges_particles(&self) -> bool {
        matches!(self, ExchangeMode::AllParticles | ExchangeMode::AllScores)
    }

    pub fn exchanges_scores(&self) -> bool {
        matches!(self, ExchangeMode::AllScores)
    }
}

impl fmt::Display for ExchangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeMode {
    type Err = SamplerErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| SamplerErr::UnknownExchangeMode(s.to_string()))
    }
}
