use chrono::{DateTime, Duration, Utc};

use super::errors::{EstimatorError, EstimatorResult};
use super::interpolator::estimate;
use super::lag::lag_between;
use super::speed::speed_stats;
use super::stats::DoubleStats;
use crate::time_series::TimeSeries;

/// How long a Consumer Group needs to reach a message published at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRemaining {
    /// Messages the Consumer Group has still to consume.
    pub messages_remaining: i64,

    /// Estimated time to consume `messages_remaining`, from "now".
    ///
    /// `None` if the Consumer Group is stalled (i.e. not moving forward).
    pub eta: Option<Duration>,
}

impl TimeRemaining {
    pub fn is_stalled(&self) -> bool {
        self.eta.is_none()
    }
}

/// [`TimeRemaining`] combined across all the partitions of a Topic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeRemainingStats {
    /// Sum of the messages remaining in every partition.
    pub messages_remaining: i64,

    /// Stats of the ETA (seconds) of the partitions that are not stalled.
    ///
    /// `None` if all partitions are stalled.
    pub eta_seconds: Option<DoubleStats>,

    pub stalled_partitions: usize,
    pub partitions: usize,
}

impl TimeRemainingStats {
    pub fn combine<'a, I: IntoIterator<Item = &'a TimeRemaining>>(per_partition: I) -> Self {
        let mut stats = TimeRemainingStats::default();
        let mut etas = Vec::new();

        for tr in per_partition {
            stats.partitions += 1;
            stats.messages_remaining = stats.messages_remaining.saturating_add(tr.messages_remaining);
            match tr.eta {
                Some(eta) => etas.push(eta.num_milliseconds() as f64 / 1000.0),
                None => stats.stalled_partitions += 1,
            }
        }
        stats.eta_seconds = DoubleStats::from_values(etas);

        stats
    }
}

/// Messages a Consumer Group has to consume at `now`, to reach the message published at `publish_timestamp`.
///
/// The target is the end offset at `publish_timestamp`: the position of the log when that message was appended.
///
/// # Arguments
///
/// * `consumer` - Offsets committed by the Consumer Group
/// * `end` - End offsets of the same Topic Partition
/// * `publish_timestamp` - When the message to reach was published
/// * `now` - Instant the Consumer Group offset is estimated at
pub fn messages_to_publish_timestamp(
    consumer: &TimeSeries,
    end: &TimeSeries,
    publish_timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EstimatorResult<i64> {
    let target_offset = estimate(end, publish_timestamp)?;
    let current_offset = estimate(consumer, now)?;

    Ok(lag_between(target_offset, current_offset))
}

/// Estimate how long a Consumer Group needs to reach the message published at `publish_timestamp`.
///
/// "Now" is the most recent of the `sampling_instants`, and the consumption speed is the mean
/// speed across them. A Consumer Group that is not moving forward is reported as stalled,
/// with its messages remaining but no ETA.
///
/// # Arguments
///
/// * `consumer` - Offsets committed by the Consumer Group
/// * `end` - End offsets of the same Topic Partition
/// * `publish_timestamp` - When the message to reach was published
/// * `sampling_instants` - Instants used to estimate the recent consumption speed
pub fn time_remaining(
    consumer: &TimeSeries,
    end: &TimeSeries,
    publish_timestamp: DateTime<Utc>,
    sampling_instants: &[DateTime<Utc>],
) -> EstimatorResult<TimeRemaining> {
    let now = sampling_instants
        .iter()
        .max()
        .copied()
        .ok_or(EstimatorError::TooFewInstants(sampling_instants.len()))?;

    let messages_remaining = messages_to_publish_timestamp(consumer, end, publish_timestamp, now)?;
    let speed = speed_stats(consumer, sampling_instants)?.mean;

    let eta = if speed > 0.0 {
        Some(Duration::milliseconds((messages_remaining as f64 / speed * 1000.0).round() as i64))
    } else {
        None
    };

    Ok(TimeRemaining {
        messages_remaining,
        eta,
    })
}
