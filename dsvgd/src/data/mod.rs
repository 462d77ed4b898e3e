pub mod dataset;
pub mod shard;

pub use dataset::InMemoryDataset;
pub use shard::{ShardSpec, shard_range};
