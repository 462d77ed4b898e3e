pub mod bootstrap;
pub mod config;
pub mod error;
pub mod launcher;
pub mod run;

pub use config::{DatasetConfig, GroupEnv, RunConfig};
pub use error::{NodeErr, Result};
pub use run::{run, run_node};
