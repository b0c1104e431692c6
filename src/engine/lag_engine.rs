use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::errors::{LagEngineError, LagEngineResult};
use crate::estimators::{
    self, EstimatorError, LagSample, SpeedSample, SpeedStats, TimeRemaining, TimeRemainingStats,
};
use crate::internals::Clock;
use crate::kafka_types::{SeriesKey, TopicPartition};
use crate::partition_resolver::PartitionResolver;
use crate::sampler::OffsetSampler;
use crate::time_series::{SeriesStatus, TimeSeries, TimeSeriesStore};

/// Layout of the instants returned by [`LagEngine::sampling_instants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingInstantsConfig {
    /// How many instants.
    pub count: usize,

    /// Distance between 2 consecutive instants.
    pub step: Duration,

    /// Distance of the most recent instant from "now".
    ///
    /// Looking slightly in the past makes it likely that the offsets at that instant were sampled.
    pub lead: Duration,
}

/// Answers lag, speed and time remaining queries about Consumer Groups.
///
/// Every query marks the series it reads as active in the [`OffsetSampler`], then estimates from
/// an immutable snapshot of their history: queries never wait for sampling to happen.
pub struct LagEngine {
    resolver: PartitionResolver,
    sampler: Arc<OffsetSampler>,
    store: Arc<TimeSeriesStore>,
    clock: Arc<dyn Clock>,
    instants_config: SamplingInstantsConfig,
}

impl LagEngine {
    pub fn new(
        resolver: PartitionResolver,
        sampler: Arc<OffsetSampler>,
        store: Arc<TimeSeriesStore>,
        clock: Arc<dyn Clock>,
        instants_config: SamplingInstantsConfig,
    ) -> Self {
        Self {
            resolver,
            sampler,
            store,
            clock,
            instants_config,
        }
    }

    /// Instants to query for, newest first: "now" minus the configured lead, then every step back.
    pub fn sampling_instants(&self) -> Vec<DateTime<Utc>> {
        let newest = self.clock.now() - self.instants_config.lead;

        (0..self.instants_config.count)
            .map(|i| newest - self.instants_config.step * i as i32)
            .collect()
    }

    /// All the partitions of `topic`.
    pub async fn partitions(&self, topic: &str) -> LagEngineResult<Vec<u32>> {
        self.resolver.partitions(topic).await
    }

    /// Partition of `topic` where records with the given `key` are produced.
    pub async fn get_partition(&self, topic: &str, key: &str) -> LagEngineResult<u32> {
        self.resolver.resolve(topic, key.as_bytes()).await
    }

    /// Lag of Consumer `group` on `tp`, at each of the given `instants` (same order).
    pub async fn get_consumer_lags(
        &self,
        group: &str,
        tp: &TopicPartition,
        instants: &[DateTime<Utc>],
    ) -> LagEngineResult<Vec<LagSample>> {
        let (consumer, end) = self.consumer_and_end_series(group, tp).await?;

        Ok(estimators::lags_at(&consumer, &end, instants)?)
    }

    /// Consumption speed of Consumer `group` on `tp`, between each adjacent pair of `instants`.
    pub async fn get_consumer_speeds(
        &self,
        group: &str,
        tp: &TopicPartition,
        instants: &[DateTime<Utc>],
    ) -> LagEngineResult<Vec<SpeedSample>> {
        let consumer = self.series(&SeriesKey::consumer(group, tp.clone())).await?;

        Ok(estimators::speeds_at(&consumer, instants)?)
    }

    /// Min, max and mean consumption speed of Consumer `group` on `tp`, across `instants`.
    pub async fn get_speed_stats(
        &self,
        group: &str,
        tp: &TopicPartition,
        instants: &[DateTime<Utc>],
    ) -> LagEngineResult<SpeedStats> {
        let consumer = self.series(&SeriesKey::consumer(group, tp.clone())).await?;

        Ok(estimators::speed_stats(&consumer, instants)?)
    }

    /// Messages Consumer `group` still has to consume on `tp`, to reach the message published at
    /// `publish_timestamp`.
    pub async fn get_messages_to_publish_timestamp(
        &self,
        group: &str,
        tp: &TopicPartition,
        publish_timestamp: DateTime<Utc>,
    ) -> LagEngineResult<LagSample> {
        let (consumer, end) = self.consumer_and_end_series(group, tp).await?;
        let now = self.clock.now() - self.instants_config.lead;

        Ok(LagSample {
            instant: now,
            lag: estimators::messages_to_publish_timestamp(&consumer, &end, publish_timestamp, now)?,
        })
    }

    /// Time Consumer `group` needs on `tp` to reach the message published at `publish_timestamp`,
    /// given its recent speed across `instants`.
    pub async fn get_time_remaining(
        &self,
        group: &str,
        tp: &TopicPartition,
        publish_timestamp: DateTime<Utc>,
        instants: &[DateTime<Utc>],
    ) -> LagEngineResult<TimeRemaining> {
        let (consumer, end) = self.consumer_and_end_series(group, tp).await?;

        Ok(estimators::time_remaining(&consumer, &end, publish_timestamp, instants)?)
    }

    /// Same as [`Self::get_time_remaining`], across all the partitions of `topic`.
    ///
    /// Fails if any of the partitions fails.
    pub async fn get_time_remaining_stats(
        &self,
        group: &str,
        topic: &str,
        publish_timestamp: DateTime<Utc>,
        instants: &[DateTime<Utc>],
    ) -> LagEngineResult<TimeRemainingStats> {
        let partitions = self.partitions(topic).await?;

        // Every partition is queried before giving up, so all of them start being sampled.
        let mut results = Vec::with_capacity(partitions.len());
        for p in partitions {
            let tp = TopicPartition::new(topic, p);
            results.push(self.get_time_remaining(group, &tp, publish_timestamp, instants).await);
        }

        let per_partition = results.into_iter().collect::<LagEngineResult<Vec<_>>>()?;
        Ok(TimeRemainingStats::combine(&per_partition))
    }

    async fn consumer_and_end_series(
        &self,
        group: &str,
        tp: &TopicPartition,
    ) -> LagEngineResult<(Arc<TimeSeries>, Arc<TimeSeries>)> {
        let consumer_key = SeriesKey::consumer(group, tp.clone());
        let end_key = SeriesKey::end(tp.clone());

        // Track both before reading either, so that they start being sampled together.
        self.sampler.track(&consumer_key).await;
        self.sampler.track(&end_key).await;

        Ok((self.snapshot(&consumer_key).await?, self.snapshot(&end_key).await?))
    }

    async fn series(&self, key: &SeriesKey) -> LagEngineResult<Arc<TimeSeries>> {
        self.sampler.track(key).await;
        self.snapshot(key).await
    }

    /// Snapshot of the series of `key`.
    ///
    /// If the series has not enough history and the Cluster reported it as not existing,
    /// the corresponding unknown group/topic error is returned instead of the snapshot.
    async fn snapshot(&self, key: &SeriesKey) -> LagEngineResult<Arc<TimeSeries>> {
        let snapshot = self.store.snapshot(key).await;

        if snapshot.as_ref().map_or(0, |s| s.len()) < 2 {
            if let Some(SeriesStatus::Unavailable(reason)) = self.store.status(key).await {
                debug!("Series {key} is unavailable: {reason}");
                return Err(match key {
                    SeriesKey::Consumer {
                        group,
                        topic_partition,
                    } => LagEngineError::UnknownGroup(group.clone(), topic_partition.clone()),
                    SeriesKey::End {
                        topic_partition,
                    } => LagEngineError::UnknownTopic(topic_partition.topic.clone()),
                });
            }
        }

        snapshot.ok_or(LagEngineError::InsufficientData(EstimatorError::TooFewSamples(0)))
    }
}

#[cfg(test)]
mod test {
    use prometheus::Registry;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::broker::mock::MockBroker;
    use crate::broker::BrokerError;
    use crate::estimators::test_support::at;
    use crate::estimators::DoubleStats;
    use crate::internals::TokioClock;
    use crate::sampler::SamplerConfig;
    use crate::time_series::SamplePoint;

    struct Harness {
        broker: Arc<MockBroker>,
        store: Arc<TimeSeriesStore>,
        engine: LagEngine,
    }

    impl Harness {
        /// Engine whose clock says it's `at(122)`.
        fn new() -> Self {
            let broker = Arc::new(MockBroker::default());
            broker.set_partitions("topicA", Ok(2));

            let store = Arc::new(TimeSeriesStore::new(Duration::hours(1), 1000));
            let clock = Arc::new(TokioClock::starting_at(at(122)));
            let sampler = Arc::new(OffsetSampler::new(
                broker.clone(),
                store.clone(),
                clock.clone(),
                SamplerConfig {
                    sampling_interval: tokio::time::Duration::from_secs(30),
                    idle_timeout: tokio::time::Duration::from_secs(3600),
                },
                CancellationToken::new(),
                Arc::new(Registry::new()),
            ));
            let resolver = PartitionResolver::new(broker.clone(), tokio::time::Duration::from_secs(30));

            let engine = LagEngine::new(
                resolver,
                sampler,
                store.clone(),
                clock,
                SamplingInstantsConfig {
                    count: 3,
                    step: Duration::seconds(60),
                    lead: Duration::seconds(2),
                },
            );

            Self {
                broker,
                store,
                engine,
            }
        }

        /// Seed the history of `key`.
        ///
        /// The broker is made unavailable for `key`, so that background sampling leaves the history untouched.
        async fn seed(&self, key: &SeriesKey, samples: &[(i64, i64)]) {
            let unavailable = Err(BrokerError::Unavailable("test".into()));
            match key {
                SeriesKey::Consumer {
                    group,
                    topic_partition,
                } => self.broker.set_committed(group, topic_partition, unavailable),
                SeriesKey::End {
                    topic_partition,
                } => self.broker.set_end(topic_partition, unavailable),
            }

            for (secs, offset) in samples {
                self.store.append(key, SamplePoint::new(at(*secs), *offset)).await;
            }
        }
    }

    fn tp(partition: u32) -> TopicPartition {
        TopicPartition::new("topicA", partition)
    }

    #[tokio::test(start_paused = true)]
    async fn sampling_instants_are_newest_first() {
        let h = Harness::new();

        assert_eq!(h.engine.sampling_instants(), vec![at(120), at(60), at(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_lags() {
        let h = Harness::new();
        h.seed(&SeriesKey::consumer("groupA", tp(0)), &[(0, 100), (60, 160)]).await;
        h.seed(&SeriesKey::end(tp(0)), &[(0, 500), (60, 500)]).await;

        let lags = h.engine.get_consumer_lags("groupA", &tp(0), &[at(30)]).await;
        assert_eq!(
            lags,
            Ok(vec![LagSample {
                instant: at(30),
                lag: 370,
            }])
        );

        // Unchanged store, same answer
        assert_eq!(h.engine.get_consumer_lags("groupA", &tp(0), &[at(30)]).await, lags);
    }

    #[tokio::test(start_paused = true)]
    async fn first_query_has_insufficient_data() {
        let h = Harness::new();
        h.broker.set_committed("groupA", &tp(0), Err(BrokerError::Unavailable("test".into())));
        h.broker.set_end(&tp(0), Err(BrokerError::Unavailable("test".into())));

        assert_eq!(
            h.engine.get_consumer_lags("groupA", &tp(0), &[at(30)]).await,
            Err(LagEngineError::InsufficientData(EstimatorError::TooFewSamples(0)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_group_once_sampled() {
        let h = Harness::new();
        h.broker.set_end(&tp(0), Ok(500));

        let _ = h.engine.get_speed_stats("groupZ", &tp(0), &[at(0), at(60)]).await;
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

        assert_eq!(
            h.engine.get_speed_stats("groupZ", &tp(0), &[at(0), at(60)]).await,
            Err(LagEngineError::UnknownGroup("groupZ".to_string(), tp(0)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_topic_once_sampled() {
        let h = Harness::new();
        let other = TopicPartition::new("topicB", 0);
        h.seed(&SeriesKey::consumer("groupA", other.clone()), &[(0, 100), (60, 160)]).await;

        let _ = h.engine.get_consumer_lags("groupA", &other, &[at(30)]).await;
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

        assert_eq!(
            h.engine.get_consumer_lags("groupA", &other, &[at(30)]).await,
            Err(LagEngineError::UnknownTopic("topicB".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_speeds_and_stats() {
        let h = Harness::new();
        h.seed(&SeriesKey::consumer("groupA", tp(0)), &[(0, 0), (60, 600), (120, 900)]).await;
        let instants = h.engine.sampling_instants();

        let speeds = h.engine.get_consumer_speeds("groupA", &tp(0), &instants).await.unwrap();
        assert_eq!(speeds.len(), 2);
        assert_eq!(speeds[0].messages_per_second, 10.0);
        assert_eq!(speeds[1].messages_per_second, 5.0);

        assert_eq!(
            h.engine.get_speed_stats("groupA", &tp(0), &instants).await,
            Ok(SpeedStats {
                min: 5.0,
                max: 10.0,
                mean: 7.5,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn messages_to_publish_timestamp() {
        let h = Harness::new();
        h.seed(&SeriesKey::consumer("groupA", tp(0)), &[(0, 1000), (60, 1000), (120, 1000)]).await;
        h.seed(&SeriesKey::end(tp(0)), &[(0, 1100), (60, 1200), (120, 1300)]).await;

        assert_eq!(
            h.engine.get_messages_to_publish_timestamp("groupA", &tp(0), at(60)).await,
            Ok(LagSample {
                instant: at(120),
                lag: 200,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_time_remaining() {
        let h = Harness::new();
        h.seed(&SeriesKey::consumer("groupA", tp(0)), &[(0, 1000), (60, 1000)]).await;
        h.seed(&SeriesKey::end(tp(0)), &[(0, 1200), (60, 1200)]).await;

        let tr = h.engine.get_time_remaining("groupA", &tp(0), at(30), &[at(60), at(0)]).await;
        assert_eq!(
            tr,
            Ok(TimeRemaining {
                messages_remaining: 200,
                eta: None,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn time_remaining_stats_across_partitions() {
        let h = Harness::new();
        // Partition 0: 10 msg/s, 600 behind the head at t=60
        h.seed(&SeriesKey::consumer("groupA", tp(0)), &[(0, 0), (60, 600), (120, 1200)]).await;
        h.seed(&SeriesKey::end(tp(0)), &[(0, 1200), (60, 1800), (120, 2400)]).await;
        // Partition 1: stalled, 100 behind
        h.seed(&SeriesKey::consumer("groupA", tp(1)), &[(0, 50), (60, 50), (120, 50)]).await;
        h.seed(&SeriesKey::end(tp(1)), &[(0, 150), (60, 150), (120, 150)]).await;

        let stats = h
            .engine
            .get_time_remaining_stats("groupA", "topicA", at(60), &[at(120), at(60), at(0)])
            .await
            .unwrap();

        assert_eq!(
            stats,
            TimeRemainingStats {
                messages_remaining: 700,
                eta_seconds: Some(DoubleStats {
                    min: 60.0,
                    max: 60.0,
                    mean: 60.0,
                }),
                stalled_partitions: 1,
                partitions: 2,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn time_remaining_stats_of_unknown_topic() {
        let h = Harness::new();

        assert_eq!(
            h.engine.get_time_remaining_stats("groupA", "topicB", at(60), &[at(120), at(60)]).await,
            Err(LagEngineError::UnknownTopic("topicB".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn partition_of_key_is_stable() {
        let h = Harness::new();

        let first = h.engine.get_partition("topicA", "keyX").await.unwrap();
        tokio::time::advance(tokio::time::Duration::from_secs(60)).await;
        let second = h.engine.get_partition("topicA", "keyX").await.unwrap();

        assert_eq!(first, second);
        assert!(first < 2);
    }
}
