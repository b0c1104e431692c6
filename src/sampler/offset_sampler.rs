use std::collections::HashMap;
use std::sync::Arc;

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry, HistogramVec, IntCounterVec, IntGauge, Registry,
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::fetch::fetch_with_retry;
use crate::broker::{BrokerError, BrokerOffsetClient};
use crate::internals::Clock;
use crate::kafka_types::SeriesKey;
use crate::prometheus_metrics::LABEL_KIND;
use crate::time_series::{SamplePoint, SeriesStatus, TimeSeriesStore};

const MET_FETCH_NAME: &str = "offset_sampler_fetch_time_seconds";
const MET_FETCH_HELP: &str = "Time (s) taken to fetch the current offset of a tracked series";
const MET_FAIL_NAME: &str = "offset_sampler_fetch_failures_total";
const MET_FAIL_HELP: &str = "Fetches of the current offset of a tracked series that failed after retrying";
const MET_TRACKED_NAME: &str = "offset_sampler_tracked_series";
const MET_TRACKED_HELP: &str = "Series currently sampled in background";

/// How often to sample, and when to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Interval between 2 samples of the same series.
    pub sampling_interval: Duration,

    /// A series not queried for longer than this, stops being sampled and is forgotten.
    pub idle_timeout: Duration,
}

/// A series being sampled by its own task.
#[derive(Debug)]
struct TrackedSeries {
    last_queried: Instant,
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

type TrackedMap = Arc<Mutex<HashMap<SeriesKey, TrackedSeries>>>;

/// Everything a sampling task needs, cloned out of the [`OffsetSampler`].
#[derive(Clone)]
struct SamplingContext {
    broker: Arc<dyn BrokerOffsetClient>,
    store: Arc<TimeSeriesStore>,
    clock: Arc<dyn Clock>,
    tracked: TrackedMap,
    config: SamplerConfig,

    // Prometheus Metrics
    metric_fetch: HistogramVec,
    metric_fail: IntCounterVec,
    metric_tracked: IntGauge,
}

/// Samples, in background, the current offset of the series that are being queried.
///
/// Tracking is demand-driven: a [`SeriesKey`] starts being sampled when first passed to
/// [`Self::track`], and stays sampled for as long as it keeps being tracked within
/// the configured idle timeout. Each series is sampled by its own async task, that is the
/// only writer of its history in the [`TimeSeriesStore`].
///
/// All the tasks shut down when the provided [`CancellationToken`] is cancelled.
pub struct OffsetSampler {
    ctx: SamplingContext,
    shutdown_token: CancellationToken,
}

impl OffsetSampler {
    /// Create a new [`OffsetSampler`].
    ///
    /// # Arguments
    ///
    /// * `broker` - Client used to fetch current offsets
    /// * `store` - Where samples are appended
    /// * `clock` - Source of the instant each sample is recorded at
    /// * `config` - Sampling interval and idle timeout
    /// * `shutdown_token` - When cancelled, all sampling tasks terminate
    /// * `metrics` - Registry to register the sampler metrics with
    pub fn new(
        broker: Arc<dyn BrokerOffsetClient>,
        store: Arc<TimeSeriesStore>,
        clock: Arc<dyn Clock>,
        config: SamplerConfig,
        shutdown_token: CancellationToken,
        metrics: Arc<Registry>,
    ) -> Self {
        Self {
            ctx: SamplingContext {
                broker,
                store,
                clock,
                tracked: Arc::new(Mutex::new(HashMap::new())),
                config,
                metric_fetch: register_histogram_vec_with_registry!(
                    MET_FETCH_NAME,
                    MET_FETCH_HELP,
                    &[LABEL_KIND],
                    metrics
                )
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_FETCH_NAME}': {e}")),
                metric_fail: register_int_counter_vec_with_registry!(
                    MET_FAIL_NAME,
                    MET_FAIL_HELP,
                    &[LABEL_KIND],
                    metrics
                )
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_FAIL_NAME}': {e}")),
                metric_tracked: register_int_gauge_with_registry!(
                    MET_TRACKED_NAME,
                    MET_TRACKED_HELP,
                    metrics
                )
                .unwrap_or_else(|e| panic!("Failed to create metric '{MET_TRACKED_NAME}': {e}")),
            },
            shutdown_token,
        }
    }

    /// Mark `key` as queried now, and start sampling it if it's not already.
    pub async fn track(&self, key: &SeriesKey) {
        let mut guard = self.ctx.tracked.lock().await;

        if let Some(ts) = guard.get_mut(key) {
            ts.last_queried = Instant::now();
            return;
        }

        info!("Begin sampling {key} every {:?}", self.ctx.config.sampling_interval);
        let cancellation_token = self.shutdown_token.child_token();
        let join_handle =
            tokio::spawn(sampling_loop(self.ctx.clone(), key.clone(), cancellation_token.clone()));

        guard.insert(
            key.clone(),
            TrackedSeries {
                last_queried: Instant::now(),
                cancellation_token,
                join_handle,
            },
        );
        self.ctx.metric_tracked.set(guard.len() as i64);
    }

    pub async fn is_tracked(&self, key: &SeriesKey) -> bool {
        self.ctx.tracked.lock().await.contains_key(key)
    }

    pub async fn tracked_count(&self) -> usize {
        self.ctx.tracked.lock().await.len()
    }

    /// Stop sampling all the series, and wait for their tasks to terminate.
    pub async fn shutdown(&self) {
        let tracked: Vec<TrackedSeries> =
            self.ctx.tracked.lock().await.drain().map(|(_, ts)| ts).collect();
        self.ctx.metric_tracked.set(0);

        for ts in tracked {
            ts.cancellation_token.cancel();
            if let Err(e) = ts.join_handle.await {
                error!("Sampling task did not terminate cleanly: {e}");
            }
        }
    }
}

/// Sample the series of `key` every [`SamplerConfig::sampling_interval`], until it goes idle or
/// `cancellation_token` is cancelled.
async fn sampling_loop(ctx: SamplingContext, key: SeriesKey, cancellation_token: CancellationToken) {
    let mut interval = interval(ctx.config.sampling_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Wait for next "tick", or get interrupted by shutdown
        tokio::select! {
            _ = interval.tick() => {
                // No-op
            },
            _ = cancellation_token.cancelled() => {
                debug!("Stop sampling {key}: cancelled");
                break;
            },
        }

        if forget_if_idle(&ctx, &key).await {
            break;
        }

        sample(&ctx, &key).await;
    }
}

/// If `key` was not queried within [`SamplerConfig::idle_timeout`], stop tracking it and drop its history.
///
/// The tracked map stays locked while the history is dropped, so a concurrent [`OffsetSampler::track`]
/// either keeps this series alive, or starts sampling it afresh.
async fn forget_if_idle(ctx: &SamplingContext, key: &SeriesKey) -> bool {
    let mut guard = ctx.tracked.lock().await;

    let is_idle = match guard.get(key) {
        Some(ts) => ts.last_queried.elapsed() > ctx.config.idle_timeout,
        None => true,
    };

    if is_idle {
        info!("Stop sampling {key}: not queried for more than {:?}", ctx.config.idle_timeout);
        guard.remove(key);
        ctx.store.remove(key).await;
        ctx.metric_tracked.set(guard.len() as i64);

        // Last series of its group gone: the broker can release what it holds for it
        if let Some(group) = key.group() {
            if !guard.keys().any(|k| k.group() == Some(group)) {
                ctx.broker.forget_group(group);
            }
        }
    }

    is_idle
}

async fn sample(ctx: &SamplingContext, key: &SeriesKey) {
    let timer = ctx.metric_fetch.with_label_values(&[key.kind()]).start_timer();
    let res_offset = fetch_with_retry(ctx.broker.as_ref(), key).await;
    timer.observe_duration();

    match res_offset {
        Ok(offset) => {
            ctx.store.append(key, SamplePoint::new(ctx.clock.now(), offset)).await;
            ctx.store.set_status(key, SeriesStatus::Available).await;
        },
        Err(BrokerError::NotFound(reason)) => {
            warn!("Unable to sample {key}: {reason}");
            ctx.store.set_status(key, SeriesStatus::Unavailable(reason)).await;
        },
        Err(BrokerError::Unavailable(reason)) => {
            ctx.metric_fail.with_label_values(&[key.kind()]).inc();
            error!("Failed to sample {key}, will retry at next interval: {reason}");
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::broker::mock::MockBroker;
    use crate::estimators::test_support::at;
    use crate::internals::TokioClock;
    use crate::kafka_types::TopicPartition;

    const SAMPLING_INTERVAL: Duration = Duration::from_secs(30);

    fn build_sampler(idle_timeout: Duration) -> (Arc<MockBroker>, Arc<TimeSeriesStore>, OffsetSampler) {
        let broker = Arc::new(MockBroker::default());
        let store = Arc::new(TimeSeriesStore::new(chrono::Duration::hours(1), 1000));
        let sampler = OffsetSampler::new(
            broker.clone(),
            store.clone(),
            Arc::new(TokioClock::starting_at(at(0))),
            SamplerConfig {
                sampling_interval: SAMPLING_INTERVAL,
                idle_timeout,
            },
            CancellationToken::new(),
            Arc::new(Registry::new()),
        );
        (broker, store, sampler)
    }

    fn end_key() -> SeriesKey {
        SeriesKey::end(TopicPartition::new("topicA", 0))
    }

    #[tokio::test(start_paused = true)]
    async fn samples_tracked_series_at_interval() {
        let (broker, store, sampler) = build_sampler(Duration::from_secs(3600));
        let k = end_key();
        broker.set_end(k.topic_partition(), Ok(500));

        sampler.track(&k).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        broker.set_end(k.topic_partition(), Ok(560));
        tokio::time::sleep(SAMPLING_INTERVAL).await;

        let snap = store.snapshot(&k).await.unwrap();
        assert_eq!(
            snap.points(),
            &[SamplePoint::new(at(0), 500), SamplePoint::new(at(30), 560)]
        );
        assert_eq!(store.status(&k).await, Some(SeriesStatus::Available));
    }

    #[tokio::test(start_paused = true)]
    async fn tracking_twice_spawns_one_task() {
        let (broker, _, sampler) = build_sampler(Duration::from_secs(3600));
        let k = end_key();
        broker.set_end(k.topic_partition(), Ok(500));

        sampler.track(&k).await;
        sampler.track(&k).await;

        assert_eq!(sampler.tracked_count().await, 1);
        assert!(sampler.is_tracked(&k).await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_series_are_forgotten() {
        let (broker, store, sampler) = build_sampler(Duration::from_secs(120));
        let k = end_key();
        broker.set_end(k.topic_partition(), Ok(500));

        sampler.track(&k).await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(store.snapshot(&k).await.is_some());

        // Tracking again keeps it alive
        sampler.track(&k).await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(sampler.is_tracked(&k).await);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(!sampler.is_tracked(&k).await);
        assert!(store.snapshot(&k).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn group_is_forgotten_with_its_last_series() {
        let (broker, _, sampler) = build_sampler(Duration::from_secs(120));
        let k0 = SeriesKey::consumer("groupA", TopicPartition::new("topicA", 0));
        let k1 = SeriesKey::consumer("groupA", TopicPartition::new("topicA", 1));
        broker.set_committed("groupA", k0.topic_partition(), Ok(100));
        broker.set_committed("groupA", k1.topic_partition(), Ok(200));

        sampler.track(&k0).await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        sampler.track(&k1).await;

        // First series goes idle, while the other one keeps the group alive
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(!sampler.is_tracked(&k0).await);
        assert!(sampler.is_tracked(&k1).await);
        assert!(broker.forgotten_groups().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!sampler.is_tracked(&k1).await);
        assert_eq!(broker.forgotten_groups(), vec!["groupA".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn end_series_do_not_forget_groups() {
        let (broker, _, sampler) = build_sampler(Duration::from_secs(60));
        let k = end_key();
        broker.set_end(k.topic_partition(), Ok(500));

        sampler.track(&k).await;
        tokio::time::sleep(Duration::from_secs(100)).await;

        assert!(!sampler.is_tracked(&k).await);
        assert!(broker.forgotten_groups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_marks_series_unavailable_until_next_success() {
        let (broker, store, sampler) = build_sampler(Duration::from_secs(3600));
        let k = SeriesKey::consumer("groupA", TopicPartition::new("topicA", 0));

        sampler.track(&k).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(store.status(&k).await, Some(SeriesStatus::Unavailable(_))));

        broker.set_committed("groupA", k.topic_partition(), Ok(100));
        tokio::time::sleep(SAMPLING_INTERVAL).await;
        assert_eq!(store.status(&k).await, Some(SeriesStatus::Available));
        assert_eq!(store.snapshot(&k).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_do_not_stop_sampling() {
        let (broker, store, sampler) = build_sampler(Duration::from_secs(3600));
        let k = end_key();
        broker.set_end(k.topic_partition(), Err(BrokerError::Unavailable("timeout".into())));

        sampler.track(&k).await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(store.snapshot(&k).await.map(|s| s.len()).unwrap_or(0), 0);

        broker.set_end(k.topic_partition(), Ok(700));
        tokio::time::sleep(SAMPLING_INTERVAL).await;
        assert_eq!(store.snapshot(&k).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_tasks() {
        let (broker, _, sampler) = build_sampler(Duration::from_secs(3600));
        let k = end_key();
        broker.set_end(k.topic_partition(), Ok(500));

        sampler.track(&k).await;
        sampler.track(&SeriesKey::consumer("groupA", k.topic_partition().clone())).await;
        assert_eq!(sampler.tracked_count().await, 2);

        sampler.shutdown().await;
        assert_eq!(sampler.tracked_count().await, 0);
    }
}
