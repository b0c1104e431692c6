use thiserror::Error;

/// Possible errors from a [`super::BrokerOffsetClient`].
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum BrokerError {
    /// The Consumer Group, Topic or Partition does not exist (or has never committed).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The Cluster could not be reached or answered with a transient error.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
