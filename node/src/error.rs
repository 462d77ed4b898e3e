use std::{error::Error, fmt, io};

use dsvgd::SamplerErr;

/// The node module's result type.
pub type Result<T> = std::result::Result<T, NodeErr>;

/// Failures raised while bringing up or driving a sampling node.
#[derive(Debug)]
pub enum NodeErr {
    Io(io::Error),
    Sampler(SamplerErr),
    Config(String),
    InvalidEnv {
        var: &'static str,
        value: String,
    },
    Handshake(String),
    ChildFailed {
        rank: usize,
        code: Option<i32>,
    },
}

impl fmt::Display for NodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeErr::Io(e) => write!(f, "io error: {e}"),
            NodeErr::Sampler(e) => write!(f, "sampler error: {e}"),
            NodeErr::Config(detail) => write!(f, "invalid run config: {detail}"),
            NodeErr::InvalidEnv { var, value } => {
                write!(f, "invalid value {value:?} for environment variable {var}")
            }
            NodeErr::Handshake(detail) => write!(f, "group handshake failed: {detail}"),
            NodeErr::ChildFailed {
                rank,
                code: Some(code),
            } => write!(f, "rank {rank} exited with status {code}"),
            NodeErr::ChildFailed { rank, code: None } => {
                write!(f, "rank {rank} was terminated by a signal")
            }
        }
    }
}

impl Error for NodeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NodeErr::Io(e) => Some(e),
            NodeErr::Sampler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for NodeErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SamplerErr> for NodeErr {
    fn from(value: SamplerErr) -> Self {
        match value {
            SamplerErr::Io(e) => Self::Io(e),
            other => Self::Sampler(other),
        }
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<NodeErr> for io::Error {
    fn from(value: NodeErr) -> Self {
        match value {
            NodeErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
