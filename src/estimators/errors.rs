use chrono::{DateTime, Utc};
use thiserror::Error;

/// Possible errors from the [`super`] module.
///
/// All of them mean that there is not enough data to produce a trustworthy estimate.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum EstimatorError {
    /// The series has not received enough samples yet.
    #[error("At least 2 samples are needed, but {0} are tracked")]
    TooFewSamples(usize),

    /// The requested instant is older than the history the series retains.
    #[error("Instant '{target}' precedes the retained history, that begins at '{horizon}'")]
    BeforeRetainedHistory {
        target: DateTime<Utc>,
        horizon: DateTime<Utc>,
    },

    /// Speed needs at least 2 distinct instants to compare.
    #[error("At least 2 distinct instants are needed, but {0} were given")]
    TooFewInstants(usize),
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;
