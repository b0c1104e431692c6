use chrono::{DateTime, Utc};

use super::errors::{EstimatorError, EstimatorResult};
use super::interpolator::estimate;
use super::stats::DoubleStats;
use crate::time_series::TimeSeries;

/// Consumption speed between 2 instants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,

    /// Negative when the Consumer Group offset was moved backward (i.e. reset/rewind).
    pub messages_per_second: f64,
}

/// Statistics over the [`SpeedSample::messages_per_second`] of a set of [`SpeedSample`].
pub type SpeedStats = DoubleStats;

/// Estimate the consumption speed of a Consumer Group between each adjacent pair of `instants`.
///
/// The instants are considered in ascending order, regardless of how they are given:
/// duplicates (at millisecond resolution) are ignored.
///
/// # Arguments
///
/// * `consumer` - Offsets committed by the Consumer Group
/// * `instants` - Instants delimiting the intervals to estimate the speed of
pub fn speeds_at(
    consumer: &TimeSeries,
    instants: &[DateTime<Utc>],
) -> EstimatorResult<Vec<SpeedSample>> {
    let offsets = distinct_ascending(instants)
        .into_iter()
        .map(|instant| estimate(consumer, instant).map(|offset| (instant, offset)))
        .collect::<EstimatorResult<Vec<_>>>()?;

    Ok(offsets
        .windows(2)
        .map(|pair| {
            let (from, from_offset) = pair[0];
            let (to, to_offset) = pair[1];
            let elapsed_secs = (to - from).num_milliseconds() as f64 / 1000.0;

            SpeedSample {
                from,
                to,
                messages_per_second: (to_offset - from_offset) as f64 / elapsed_secs,
            }
        })
        .collect())
}

/// Min, max and mean consumption speed of a Consumer Group over the given `instants`.
///
/// See [`speeds_at`].
pub fn speed_stats(consumer: &TimeSeries, instants: &[DateTime<Utc>]) -> EstimatorResult<SpeedStats> {
    let distinct = distinct_ascending(instants).len();
    if distinct < 2 {
        return Err(EstimatorError::TooFewInstants(distinct));
    }

    let speeds = speeds_at(consumer, instants)?;
    DoubleStats::from_values(speeds.iter().map(|s| s.messages_per_second))
        .ok_or(EstimatorError::TooFewInstants(distinct))
}

/// `instants` sorted, without those falling within the same millisecond of the previous one.
///
/// Offsets are estimated at millisecond resolution: this keeps every interval non-empty.
fn distinct_ascending(instants: &[DateTime<Utc>]) -> Vec<DateTime<Utc>> {
    let mut sorted = instants.to_vec();
    sorted.sort_unstable();
    sorted.dedup_by_key(|i| i.timestamp_millis());
    sorted
}
