use std::{error::Error, fmt, io};

/// The sampler module's result type.
pub type Result<T> = std::result::Result<T, SamplerErr>;

/// Failures raised while building or stepping a distributed sampler.
#[derive(Debug)]
pub enum SamplerErr {
    Io(io::Error),
    InvalidConfig(String),
    UnknownExchangeMode(String),
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    NonFinite {
        step: usize,
        what: &'static str,
        index: usize,
    },
    /// A peer's particle has a non-finite score under this worker's shard.
    NonFiniteRemote {
        step: usize,
        rank: usize,
        index: usize,
    },
    UnexpectedMessage {
        step: usize,
        got: &'static str,
    },
    PayloadLengthMismatch {
        step: usize,
        got: usize,
        expected: usize,
    },
    PeerFailed {
        rank: usize,
        detail: String,
    },
}

impl fmt::Display for SamplerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerErr::Io(e) => write!(f, "io error: {e}"),
            SamplerErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            SamplerErr::UnknownExchangeMode(mode) => write!(
                f,
                "unknown exchange mode {mode:?}, expected one of partitions, all_particles, all_scores"
            ),
            SamplerErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            SamplerErr::NonFinite { step, what, index } => {
                write!(f, "non-finite {what} for particle {index} at step {step}")
            }
            SamplerErr::NonFiniteRemote { step, rank, index } => write!(
                f,
                "non-finite score for particle {index} of rank {rank} at step {step}"
            ),
            SamplerErr::UnexpectedMessage { step, got } => {
                write!(f, "unexpected message at step {step}: got {got}")
            }
            SamplerErr::PayloadLengthMismatch {
                step,
                got,
                expected,
            } => write!(
                f,
                "payload length mismatch at step {step}: got {got}, expected {expected}"
            ),
            SamplerErr::PeerFailed { rank, detail } => {
                write!(f, "peer {rank} failed: {detail}")
            }
        }
    }
}

impl Error for SamplerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SamplerErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SamplerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<SamplerErr> for io::Error {
    fn from(value: SamplerErr) -> Self {
        match value {
            SamplerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
