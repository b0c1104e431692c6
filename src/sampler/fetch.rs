use tokio::time::{sleep, Duration};

use crate::broker::{BrokerError, BrokerOffsetClient, BrokerResult};
use crate::kafka_types::SeriesKey;

const RETRY_ATTEMPTS: usize = 4;
const RETRY_BACKOFF_INITIAL: Duration = Duration::from_millis(100);
const RETRY_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Fetch the current offset of the series identified by `key`.
async fn fetch(broker: &dyn BrokerOffsetClient, key: &SeriesKey) -> BrokerResult<i64> {
    match key {
        SeriesKey::Consumer {
            group,
            topic_partition,
        } => broker.committed_offset(group, topic_partition).await,
        SeriesKey::End {
            topic_partition,
        } => broker.end_offset(topic_partition).await,
    }
}

/// Same as [`fetch`], but [`BrokerError::Unavailable`] is retried with exponential backoff.
///
/// Gives up after `RETRY_ATTEMPTS`, returning the last error.
pub(super) async fn fetch_with_retry(
    broker: &dyn BrokerOffsetClient,
    key: &SeriesKey,
) -> BrokerResult<i64> {
    let mut backoff = RETRY_BACKOFF_INITIAL;
    let mut attempt = 1;

    loop {
        match fetch(broker, key).await {
            Err(BrokerError::Unavailable(reason)) if attempt < RETRY_ATTEMPTS => {
                debug!("Attempt {attempt} to fetch offset of {key} failed ({reason}): retrying in {backoff:?}");
                sleep(backoff).await;
                backoff = (backoff * 2).min(RETRY_BACKOFF_MAX);
                attempt += 1;
            },
            res => return res,
        }
    }
}
