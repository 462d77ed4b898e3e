use std::num::NonZeroUsize;
use std::ops::Range;

use crate::{Result, SamplerErr};

/// Splits `total` samples among `num_shards` and returns the rows owned by `rank`.
///
/// Properties:
/// - Every shard holds exactly `total / num_shards` contiguous rows.
/// - Ranges are disjoint and ordered by rank.
/// - The trailing `total % num_shards` rows belong to no shard.
pub fn shard_range(total: usize, rank: usize, num_shards: usize) -> Range<usize> {
    assert!(num_shards > 0);
    assert!(rank < num_shards);

    let per_shard = total / num_shards;
    rank * per_shard..(rank + 1) * per_shard
}

/// Shard specification for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    rank: usize,
    num_shards: NonZeroUsize,
}

impl ShardSpec {
    /// Creates a new `ShardSpec`.
    ///
    /// # Errors
    /// `InvalidConfig` if `rank` is not below `num_shards`.
    pub fn new(rank: usize, num_shards: NonZeroUsize) -> Result<Self> {
        if rank >= num_shards.get() {
            return Err(SamplerErr::InvalidConfig(format!(
                "rank {rank} is out of range for {num_shards} shard(s)"
            )));
        }

        Ok(Self { rank, num_shards })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn num_shards(&self) -> usize {
        self.num_shards.get()
    }

    /// Resolves the shard rows against a dataset of `total` rows.
    ///
    /// # Errors
    /// `InvalidConfig` if there are more shards than rows, which would leave shards empty.
    pub fn range(&self, total: usize) -> Result<Range<usize>> {
        if self.num_shards() > total {
            return Err(SamplerErr::InvalidConfig(format!(
                "{} shard(s) exceed the dataset size of {total} row(s)",
                self.num_shards
            )));
        }

        Ok(shard_range(total, self.rank, self.num_shards()))
    }
}
