// Inner modules
mod errors;
#[cfg(unix)]
mod kafka;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::kafka_types::TopicPartition;

// Exports
pub use errors::{BrokerError, BrokerResult};
#[cfg(unix)]
pub use kafka::KafkaBrokerClient;

/// Reads the current offsets of a Kafka Cluster.
///
/// Every call observes "now": the Cluster keeps no history of these values.
#[async_trait]
pub trait BrokerOffsetClient: Send + Sync {
    /// Offset currently committed by Consumer `group` for the given [`TopicPartition`].
    async fn committed_offset(&self, group: &str, tp: &TopicPartition) -> BrokerResult<i64>;

    /// Current end offset (i.e. offset of the next message to be produced) of the given [`TopicPartition`].
    async fn end_offset(&self, tp: &TopicPartition) -> BrokerResult<i64>;

    /// Current amount of partitions of `topic`.
    async fn partition_count(&self, topic: &str) -> BrokerResult<u32>;

    /// Release whatever is held to read the committed offsets of `group`.
    ///
    /// Called once no series of `group` is sampled anymore.
    fn forget_group(&self, group: &str);
}
