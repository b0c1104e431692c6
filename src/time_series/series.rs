use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use super::sample_point::SamplePoint;

/// History of [`SamplePoint`]s for a single series, ordered by instant.
///
/// It's bounded both in age (`retention`, measured from the newest sample)
/// and in length (`max_points`): once either limit is exceeded, the oldest points are dropped,
/// realising a "moving window" of offsets history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeries {
    points: VecDeque<SamplePoint>,
    retention: Duration,
    max_points: usize,

    /// Set once a point has been dropped because of `max_points`:
    /// from then on, history before the earliest point is gone even if within `retention`.
    truncated: bool,
}

impl TimeSeries {
    /// Create an empty [`TimeSeries`].
    ///
    /// # Arguments
    ///
    /// * `retention` - How far back from the newest sample, points are kept
    /// * `max_points` - Maximum amount of points kept, regardless of their age
    pub fn new(retention: Duration, max_points: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(max_points.min(1024)),
            retention,
            max_points: max_points.max(2),
            truncated: false,
        }
    }

    /// Append a new [`SamplePoint`], returning `false` if it was dropped.
    ///
    /// A point is dropped if its instant does not follow the newest known one:
    /// sampling is best-effort, so duplicate polls or clock skew are ignored.
    pub(crate) fn push(&mut self, point: SamplePoint) -> bool {
        if let Some(newest) = self.points.back() {
            if point.instant <= newest.instant {
                warn!(
                    "Sample of offset {} at '{}' does not follow newest sample at '{}': ignoring",
                    point.offset, point.instant, newest.instant
                );
                return false;
            }
        }

        self.points.push_back(point);

        // Evict by age, relative to the instant of the sample just appended
        if let Some(horizon) = point.instant.checked_sub_signed(self.retention) {
            while self.points.front().is_some_and(|oldest| oldest.instant < horizon) {
                self.points.pop_front();
            }
        }

        // Evict by length
        while self.points.len() > self.max_points {
            self.points.pop_front();
            self.truncated = true;
        }

        // Keep a contiguous slice available for binary search on reads.
        self.points.make_contiguous();
        true
    }

    /// All the points, oldest first.
    pub fn points(&self) -> &[SamplePoint] {
        let (slice, rest) = self.points.as_slices();
        debug_assert!(rest.is_empty(), "TimeSeries points should always be contiguous");
        slice
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn earliest(&self) -> Option<&SamplePoint> {
        self.points.front()
    }

    pub fn latest(&self) -> Option<&SamplePoint> {
        self.points.back()
    }

    /// Oldest instant this series can answer for: `retention` before the newest sample.
    ///
    /// If points were ever dropped to respect `max_points`, the horizon can't precede
    /// the earliest point still held.
    ///
    /// Returns `None` if the series is empty.
    pub fn horizon(&self) -> Option<DateTime<Utc>> {
        let newest = self.latest()?;
        let by_age =
            newest.instant.checked_sub_signed(self.retention).unwrap_or(DateTime::<Utc>::MIN_UTC);

        match self.earliest() {
            Some(earliest) if self.truncated => Some(by_age.max(earliest.instant)),
            _ => Some(by_age),
        }
    }
}
