use std::collections::HashMap;
use std::sync::Arc;

use murmur2::murmur2;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::broker::BrokerOffsetClient;
use crate::engine::{LagEngineError, LagEngineResult};

/// Seed used by the Kafka default partitioner when hashing record keys.
const KAFKA_MURMUR2_SEED: u32 = 0x9747_b28c;

/// Partition that the Kafka default partitioner assigns to a record with the given `key`.
///
/// This is `murmur2(key)`, made positive and taken modulo `partition_count`:
/// the same scheme producers use, so the result matches where keyed records actually land.
pub fn partition_for_key(key: &[u8], partition_count: u32) -> u32 {
    (murmur2(key, KAFKA_MURMUR2_SEED) & 0x7fff_ffff) % partition_count.max(1)
}

#[derive(Debug, Clone, Copy)]
struct CachedPartitionCount {
    count: u32,
    fetched_at: Instant,
}

/// Resolves record keys to Topic Partitions.
///
/// The partition count of each topic is fetched from the Cluster and cached for `ttl`.
pub struct PartitionResolver {
    broker: Arc<dyn BrokerOffsetClient>,
    ttl: Duration,
    partition_counts: RwLock<HashMap<String, CachedPartitionCount>>,
}

impl PartitionResolver {
    /// Create a new [`PartitionResolver`].
    ///
    /// # Arguments
    ///
    /// * `broker` - Client used to fetch topics partition count
    /// * `ttl` - For how long a fetched partition count is reused
    pub fn new(broker: Arc<dyn BrokerOffsetClient>, ttl: Duration) -> Self {
        Self {
            broker,
            ttl,
            partition_counts: RwLock::new(HashMap::new()),
        }
    }

    /// Current partition count of `topic`.
    pub async fn partition_count(&self, topic: &str) -> LagEngineResult<u32> {
        if let Some(cached) = self.partition_counts.read().await.get(topic) {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.count);
            }
        }

        let count = self
            .broker
            .partition_count(topic)
            .await
            .map_err(|e| LagEngineError::from_topic_lookup(topic, e))?;

        if count == 0 {
            return Err(LagEngineError::UnknownTopic(topic.to_string()));
        }

        trace!("Topic '{topic}' has {count} partitions");
        self.partition_counts.write().await.insert(
            topic.to_string(),
            CachedPartitionCount {
                count,
                fetched_at: Instant::now(),
            },
        );

        Ok(count)
    }

    /// All the partitions of `topic`.
    pub async fn partitions(&self, topic: &str) -> LagEngineResult<Vec<u32>> {
        Ok((0..self.partition_count(topic).await?).collect())
    }

    /// Partition of `topic` where records with the given `key` are produced.
    pub async fn resolve(&self, topic: &str, key: &[u8]) -> LagEngineResult<u32> {
        Ok(partition_for_key(key, self.partition_count(topic).await?))
    }
}
