use chrono::{DateTime, Utc};

use super::errors::EstimatorResult;
use super::interpolator::estimate;
use crate::time_series::TimeSeries;

/// Lag of a Consumer Group at a specific instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LagSample {
    pub instant: DateTime<Utc>,

    /// Messages between the end offset and the Consumer Group offset; never negative.
    pub lag: i64,
}

/// Estimate the lag of a Consumer Group at each of the given `instants`, in the same order.
///
/// The lag is clamped to `0`: the consumer and end offsets series are polled at slightly
/// different times, so the consumer can look ahead of the end offset.
///
/// If either series can't be estimated at one of the instants, the whole estimation fails.
///
/// # Arguments
///
/// * `consumer` - Offsets committed by the Consumer Group
/// * `end` - End offsets of the same Topic Partition
/// * `instants` - Instants to estimate the lag at
pub fn lags_at(
    consumer: &TimeSeries,
    end: &TimeSeries,
    instants: &[DateTime<Utc>],
) -> EstimatorResult<Vec<LagSample>> {
    instants
        .iter()
        .map(|&instant| {
            Ok(LagSample {
                instant,
                lag: lag_between(estimate(end, instant)?, estimate(consumer, instant)?),
            })
        })
        .collect()
}

/// Messages from `from_offset` (excluded) up to `to_offset`, clamped to `0`.
pub(crate) fn lag_between(to_offset: i64, from_offset: i64) -> i64 {
    to_offset.saturating_sub(from_offset).max(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::estimators::errors::EstimatorError;
    use crate::estimators::test_support::{at, build_series};

    #[test]
    fn lag_between_interpolated_series() {
        let consumer = build_series(3600, &[(0, 100), (60, 160)]);
        let end = build_series(3600, &[(0, 500), (60, 500)]);

        assert_eq!(
            lags_at(&consumer, &end, &[at(30)]),
            Ok(vec![LagSample {
                instant: at(30),
                lag: 370,
            }])
        );
    }

    #[test]
    fn lags_follow_requested_order() {
        let consumer = build_series(3600, &[(0, 100), (60, 160), (120, 220)]);
        let end = build_series(3600, &[(0, 500), (60, 600), (120, 700)]);

        let lags = lags_at(&consumer, &end, &[at(120), at(60), at(0)]).unwrap();
        assert_eq!(lags.iter().map(|l| l.instant).collect::<Vec<_>>(), vec![at(120), at(60), at(0)]);
        assert_eq!(lags.iter().map(|l| l.lag).collect::<Vec<_>>(), vec![480, 440, 400]);
    }

    #[test]
    fn lag_is_never_negative() {
        // Consumer series polled after the end series: it looks ahead of the end offset
        let consumer = build_series(3600, &[(5, 510), (65, 620)]);
        let end = build_series(3600, &[(0, 500), (60, 600)]);

        for l in lags_at(&consumer, &end, &[at(0), at(30), at(60), at(90)]).unwrap() {
            assert!(l.lag >= 0);
        }
    }

    #[test]
    fn no_partial_results() {
        let consumer = build_series(3600, &[(0, 100), (60, 160)]);
        let end = build_series(3600, &[(60, 500)]);

        assert_eq!(lags_at(&consumer, &end, &[at(30)]), Err(EstimatorError::TooFewSamples(1)));
    }
}
