use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by primitive construction, imitation and rollout.
///
/// Every variant is an input shape or content violation. Numerical
/// degeneracy (a basis function that is never visited) is absorbed by the
/// regression epsilon and never surfaces here.
#[derive(Error, Debug)]
pub enum DmpError {
    #[error("weight matrix must be {expected:?} (dimensions x basis functions), got {actual:?}")]
    WeightShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("{what} must contain {expected} values (got {actual})")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("dimension {dimension} has no valid samples")]
    NoValidSamples { dimension: usize },
    #[error("demonstrated trajectory contains no samples")]
    EmptyTrajectory,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("weight serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DmpError>;
