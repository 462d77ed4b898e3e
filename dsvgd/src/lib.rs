pub mod comm;
pub mod data;
pub mod error;
pub mod exchange;
pub mod kernel;
pub mod model;
pub mod particles;
pub mod sampler;
pub mod transport;

pub use comm::{Communicator, LocalGroup, StarGroup};
pub use data::{InMemoryDataset, ShardSpec};
pub use error::{Result, SamplerErr};
pub use exchange::ExchangeMode;
pub use kernel::{Kernel, Rbf};
pub use model::{IsotropicGaussian, LogDensity, LogisticPosterior};
pub use particles::{ParticleRow, Particles};
pub use sampler::DistSampler;
