use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BrokerError, BrokerOffsetClient, BrokerResult};
use crate::kafka_types::TopicPartition;

/// In-memory [`BrokerOffsetClient`], whose answers are set by the test.
#[derive(Debug, Default)]
pub(crate) struct MockBroker {
    committed: Mutex<HashMap<(String, TopicPartition), BrokerResult<i64>>>,
    end: Mutex<HashMap<TopicPartition, BrokerResult<i64>>>,
    partitions: Mutex<HashMap<String, BrokerResult<u32>>>,
    pub(crate) partition_count_calls: AtomicUsize,
    forgotten_groups: Mutex<Vec<String>>,
}

impl MockBroker {
    pub(crate) fn set_committed(&self, group: &str, tp: &TopicPartition, res: BrokerResult<i64>) {
        self.committed.lock().unwrap().insert((group.to_string(), tp.clone()), res);
    }

    pub(crate) fn set_end(&self, tp: &TopicPartition, res: BrokerResult<i64>) {
        self.end.lock().unwrap().insert(tp.clone(), res);
    }

    pub(crate) fn set_partitions(&self, topic: &str, res: BrokerResult<u32>) {
        self.partitions.lock().unwrap().insert(topic.to_string(), res);
    }

    /// Groups passed to [`BrokerOffsetClient::forget_group`], in order.
    pub(crate) fn forgotten_groups(&self) -> Vec<String> {
        self.forgotten_groups.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerOffsetClient for MockBroker {
    async fn committed_offset(&self, group: &str, tp: &TopicPartition) -> BrokerResult<i64> {
        self.committed
            .lock()
            .unwrap()
            .get(&(group.to_string(), tp.clone()))
            .cloned()
            .unwrap_or_else(|| Err(BrokerError::NotFound(format!("group '{group}' on '{tp}'"))))
    }

    async fn end_offset(&self, tp: &TopicPartition) -> BrokerResult<i64> {
        self.end
            .lock()
            .unwrap()
            .get(tp)
            .cloned()
            .unwrap_or_else(|| Err(BrokerError::NotFound(format!("partition '{tp}'"))))
    }

    async fn partition_count(&self, topic: &str) -> BrokerResult<u32> {
        self.partition_count_calls.fetch_add(1, Ordering::SeqCst);
        self.partitions
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .unwrap_or_else(|| Err(BrokerError::NotFound(format!("topic '{topic}'"))))
    }

    fn forget_group(&self, group: &str) {
        self.forgotten_groups.lock().unwrap().push(group.to_string());
    }
}
