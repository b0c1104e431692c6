use std::sync::Arc;

use lagtrace::engine::{LagEngine, LagEngineError};
use lagtrace::estimators::DoubleStats;
use lagtrace::kafka_types::TopicPartition;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cli::WatchTarget;

/// Periodically logs lag, speed and time remaining of the Consumer Groups passed via `--watch`.
///
/// Querying the [`LagEngine`] is also what keeps the watched series sampled.
pub struct WatchReporter {
    engine: Arc<LagEngine>,
    targets: Vec<WatchTarget>,
    report_interval: Duration,
}

impl WatchReporter {
    pub fn new(engine: Arc<LagEngine>, targets: Vec<WatchTarget>, report_interval: Duration) -> Self {
        Self {
            engine,
            targets,
            report_interval,
        }
    }

    /// Spawn the reporting loop, running until `shutdown_token` is cancelled.
    pub fn spawn(self, shutdown_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(self.report_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        for target in self.targets.iter() {
                            self.report(target).await;
                        }
                    },
                    _ = shutdown_token.cancelled() => {
                        info!("Shutting down");
                        break;
                    },
                }
            }
        })
    }

    async fn report(&self, target: &WatchTarget) {
        let WatchTarget {
            group,
            topic,
        } = target;
        let instants = self.engine.sampling_instants();
        let Some(newest) = instants.first().copied() else {
            return;
        };

        let partitions = match self.engine.partitions(topic).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Unable to report on '{group}' for '{topic}': {e}");
                return;
            },
        };

        for p in partitions {
            let tp = TopicPartition::new(topic.as_str(), p);

            let lag = self.engine.get_consumer_lags(group, &tp, &[newest]).await;
            let speed = self.engine.get_speed_stats(group, &tp, &instants).await;
            match (lag, speed) {
                (Ok(lag), Ok(speed)) => {
                    let lag = lag.first().map_or(0, |l| l.lag);
                    info!("'{group}' on {tp}: lag={lag} speed={:.2} msg/s", speed.mean);
                },
                (Err(e), _) | (_, Err(e)) => log_query_error(group, &tp.to_string(), &e),
            }
        }

        match self.engine.get_time_remaining_stats(group, topic, newest, &instants).await {
            Ok(trs) => info!(
                "'{group}' on '{topic}': {} messages remaining, ETA {} ({} of {} partitions stalled)",
                trs.messages_remaining,
                describe_eta(trs.eta_seconds),
                trs.stalled_partitions,
                trs.partitions
            ),
            Err(e) => log_query_error(group, topic, &e),
        }
    }
}

fn log_query_error(group: &str, target: &str, e: &LagEngineError) {
    match e {
        // Expected while the history of newly watched series fills up
        LagEngineError::InsufficientData(_) => debug!("'{group}' on '{target}': {e}"),
        _ => warn!("'{group}' on '{target}': {e}"),
    }
}

fn describe_eta(eta_seconds: Option<DoubleStats>) -> String {
    match eta_seconds {
        Some(s) => format!("min={:.0}s max={:.0}s mean={:.0}s", s.min, s.max, s.mean),
        None => "unknown (stalled)".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eta_description() {
        assert_eq!(
            describe_eta(Some(DoubleStats {
                min: 12.4,
                max: 90.0,
                mean: 51.2,
            })),
            "min=12s max=90s mean=51s"
        );
        assert_eq!(describe_eta(None), "unknown (stalled)");
    }
}
