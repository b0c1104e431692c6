use chrono::{DateTime, Utc};

use super::errors::{EstimatorError, EstimatorResult};
use crate::time_series::{search, SamplePoint, SamplePointSearchRes, TimeSeries};

/// Estimate the offset of a [`TimeSeries`] at the given `target` instant.
///
/// This is done by linear interpolation between the 2 samples around `target`.
/// When `target` is outside the sampled range, the slope of the nearest pair of samples
/// is used to extrapolate:
///
/// * backward, the result is clamped within `[0, latest sampled offset]`
/// * forward, the result is clamped to be non-negative
///
/// Fails if the series has less than 2 samples, or if `target` is older than the
/// history retained by the series.
///
/// # Arguments
///
/// * `series` - Offsets history to estimate from
/// * `target` - Instant we want to know the offset of
pub fn estimate(series: &TimeSeries, target: DateTime<Utc>) -> EstimatorResult<i64> {
    let points = series.points();
    if points.len() < 2 {
        return Err(EstimatorError::TooFewSamples(points.len()));
    }

    let horizon = series.horizon().ok_or(EstimatorError::TooFewSamples(0))?;
    if target < horizon {
        return Err(EstimatorError::BeforeRetainedHistory {
            target,
            horizon,
        });
    }

    let first = &points[0];
    let last = &points[points.len() - 1];

    match search(target, points) {
        SamplePointSearchRes::Exact(found) => Ok(found.offset),
        SamplePointSearchRes::Range(before, after) => Ok(interpolate(&before, &after, target)),
        SamplePointSearchRes::Before => {
            Ok(interpolate(first, &points[1], target).max(0).min(last.offset.max(0)))
        },
        SamplePointSearchRes::After => {
            Ok(interpolate(&points[points.len() - 2], last, target).max(0))
        },
        SamplePointSearchRes::Empty => Err(EstimatorError::TooFewSamples(0)),
    }
}

/// Find the offset at instant `x_instant`, on the line passing through `p1` and `p2`.
///
/// The "cartesian plan" can imagined with _time_ on the _x-axis_, and _offset_ on the _y-axis_.
fn interpolate(p1: &SamplePoint, p2: &SamplePoint, x_instant: DateTime<Utc>) -> i64 {
    // Formula:
    //   y = y1 + m * (x - x1)

    let x1 = p1.instant.timestamp_millis() as f64;
    let y1 = p1.offset as f64;
    let x2 = p2.instant.timestamp_millis() as f64;
    let y2 = p2.offset as f64;
    let x = x_instant.timestamp_millis() as f64;

    // Slope `m`:
    //   m = (y2 - y1) / (x2 - x1)
    let m = (y2 - y1) / (x2 - x1);

    (y1 + m * (x - x1)).round() as i64
}
