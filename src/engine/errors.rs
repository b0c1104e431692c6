use thiserror::Error;

use crate::broker::BrokerError;
use crate::estimators::EstimatorError;
use crate::kafka_types::TopicPartition;

/// Possible errors from the [`super::LagEngine`] operations.
///
/// A stalled Consumer Group is not an error: see [`crate::estimators::TimeRemaining::is_stalled`].
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum LagEngineError {
    /// The Topic (or one of its Partitions) does not exist in the Cluster.
    #[error("Topic '{0}' is unknown")]
    UnknownTopic(String),

    /// The Consumer Group has no committed offset for the Topic Partition.
    #[error("Consumer Group '{0}' is unknown for '{1}'")]
    UnknownGroup(String, TopicPartition),

    /// Not enough offsets history to estimate the requested instants.
    #[error("Insufficient data: {0}")]
    InsufficientData(#[from] EstimatorError),

    /// The Cluster could not be reached.
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),
}

impl LagEngineError {
    /// Map a [`BrokerError`] received while looking up `topic`.
    pub(crate) fn from_topic_lookup(topic: &str, e: BrokerError) -> Self {
        match e {
            BrokerError::NotFound(_) => LagEngineError::UnknownTopic(topic.to_string()),
            BrokerError::Unavailable(reason) => LagEngineError::BrokerUnavailable(reason),
        }
    }
}

pub type LagEngineResult<T> = Result<T, LagEngineError>;
