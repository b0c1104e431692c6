use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rdkafka::{
    consumer::{BaseConsumer, Consumer},
    error::{KafkaError, RDKafkaErrorCode},
    ClientConfig, Offset, TopicPartitionList,
};
use tokio::time::Duration;

use super::{BrokerError, BrokerOffsetClient, BrokerResult};
use crate::kafka_types::TopicPartition;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// [`BrokerOffsetClient`] for a Kafka Cluster, built on `librdkafka` consumers.
///
/// Fetching a committed offset requires a consumer configured with the `group.id` of interest:
/// one is created (lazily) per Consumer Group and kept for reuse.
/// Those consumers never subscribe nor commit, so they don't join the groups.
///
/// All calls to `librdkafka` are blocking, so they are run via [`tokio::task::spawn_blocking`].
pub struct KafkaBrokerClient {
    client_config: ClientConfig,
    metadata_consumer: Arc<BaseConsumer>,
    group_consumers: Mutex<HashMap<String, Arc<BaseConsumer>>>,
}

impl KafkaBrokerClient {
    /// Creates a new [`KafkaBrokerClient`].
    ///
    /// # Arguments
    ///
    /// * `client_config` - Kafka client configuration, used to create all the internal consumers
    pub fn new(client_config: ClientConfig) -> BrokerResult<Self> {
        let metadata_consumer = Self::set_kafka_config(client_config.clone())
            .create::<BaseConsumer>()
            .map_err(|e| BrokerError::Unavailable(format!("Failed to allocate Consumer Client: {e}")))?;

        Ok(Self {
            client_config,
            metadata_consumer: Arc::new(metadata_consumer),
            group_consumers: Mutex::new(HashMap::new()),
        })
    }

    fn set_kafka_config(mut client_config: ClientConfig) -> ClientConfig {
        client_config.set("enable.auto.commit", "false");
        client_config.set("enable.auto.offset.store", "false");
        client_config
    }

    fn group_consumer(&self, group: &str) -> BrokerResult<Arc<BaseConsumer>> {
        let mut guard = self
            .group_consumers
            .lock()
            .map_err(|e| BrokerError::Unavailable(format!("Consumers cache poisoned: {e}")))?;

        if let Some(c) = guard.get(group) {
            return Ok(c.clone());
        }

        let mut config = Self::set_kafka_config(self.client_config.clone());
        config.set("group.id", group);
        let consumer = Arc::new(config.create::<BaseConsumer>().map_err(|e| {
            BrokerError::Unavailable(format!("Failed to allocate Consumer Client for '{group}': {e}"))
        })?);

        debug!("Created Consumer Client to read offsets of group '{group}'");
        guard.insert(group.to_string(), consumer.clone());
        Ok(consumer)
    }
}

#[async_trait]
impl BrokerOffsetClient for KafkaBrokerClient {
    async fn committed_offset(&self, group: &str, tp: &TopicPartition) -> BrokerResult<i64> {
        let consumer = self.group_consumer(group)?;
        let group = group.to_string();
        let tp = tp.clone();

        run_blocking(move || {
            let mut tpl = TopicPartitionList::new();
            tpl.add_partition(&tp.topic, tp.partition as i32);

            let committed = consumer.committed_offsets(tpl, FETCH_TIMEOUT).map_err(classify)?;
            let elem = committed.find_partition(&tp.topic, tp.partition as i32).ok_or_else(|| {
                BrokerError::NotFound(format!("No committed offset of group '{group}' for '{tp}'"))
            })?;
            elem.error().map_err(classify)?;

            match elem.offset() {
                Offset::Offset(o) => Ok(o),
                other => Err(BrokerError::NotFound(format!(
                    "Group '{group}' has no committed offset for '{tp}' ({other:?})"
                ))),
            }
        })
        .await
    }

    async fn end_offset(&self, tp: &TopicPartition) -> BrokerResult<i64> {
        let consumer = self.metadata_consumer.clone();
        let tp = tp.clone();

        run_blocking(move || {
            consumer
                .fetch_watermarks(&tp.topic, tp.partition as i32, FETCH_TIMEOUT)
                .map(|(_, latest)| latest)
                .map_err(classify)
        })
        .await
    }

    async fn partition_count(&self, topic: &str) -> BrokerResult<u32> {
        let consumer = self.metadata_consumer.clone();
        let topic = topic.to_string();

        run_blocking(move || {
            let metadata = consumer.fetch_metadata(Some(&topic), FETCH_TIMEOUT).map_err(classify)?;
            let mt = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .ok_or_else(|| BrokerError::NotFound(format!("Topic '{topic}' not in metadata")))?;

            if let Some(e) = mt.error() {
                let code = RDKafkaErrorCode::from(e);
                return Err(if is_not_found(code) {
                    BrokerError::NotFound(format!("Topic '{topic}': {code}"))
                } else {
                    BrokerError::Unavailable(format!("Topic '{topic}': {code}"))
                });
            }

            match mt.partitions().len() {
                0 => Err(BrokerError::NotFound(format!("Topic '{topic}' has no partitions"))),
                n => Ok(n as u32),
            }
        })
        .await
    }

    fn forget_group(&self, group: &str) {
        match self.group_consumers.lock() {
            Ok(mut guard) => {
                if guard.remove(group).is_some() {
                    debug!("Dropped Consumer Client of group '{group}'");
                }
            },
            Err(e) => error!("Unable to drop Consumer Client of group '{group}': {e}"),
        }
    }
}

async fn run_blocking<T, F>(f: F) -> BrokerResult<T>
where
    F: FnOnce() -> BrokerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrokerError::Unavailable(format!("Blocking fetch did not complete: {e}")))?
}

fn is_not_found(code: RDKafkaErrorCode) -> bool {
    matches!(
        code,
        RDKafkaErrorCode::UnknownTopicOrPartition
            | RDKafkaErrorCode::UnknownTopic
            | RDKafkaErrorCode::UnknownPartition
            | RDKafkaErrorCode::GroupIdNotFound
    )
}

fn classify(e: KafkaError) -> BrokerError {
    match e.rdkafka_error_code() {
        Some(code) if is_not_found(code) => BrokerError::NotFound(e.to_string()),
        _ => BrokerError::Unavailable(e.to_string()),
    }
}
