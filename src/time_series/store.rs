use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;

use super::sample_point::SamplePoint;
use super::series::TimeSeries;
use crate::kafka_types::SeriesKey;

/// Whether the sampler managed to observe a series.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeriesStatus {
    /// No poll has completed yet.
    #[default]
    Pending,

    /// Last poll succeeded.
    Available,

    /// Last poll reported the series as not existing (e.g. unknown group or topic).
    Unavailable(String),
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesStatus::Pending => write!(f, "pending"),
            SeriesStatus::Available => write!(f, "available"),
            SeriesStatus::Unavailable(reason) => write!(f, "unavailable ({reason})"),
        }
    }
}

/// A single series, and its status.
///
/// The [`TimeSeries`] is behind an [`Arc`]: appending goes through [`Arc::make_mut`],
/// so that a snapshot already handed to a reader is never mutated.
#[derive(Debug)]
struct SeriesEntry {
    series: RwLock<Arc<TimeSeries>>,
    status: RwLock<SeriesStatus>,
}

/// Holds the offsets history of every tracked [`SeriesKey`].
///
/// Each key has its own lock: the lock over the whole map is taken in write mode
/// only when a key is added or removed, so unrelated keys don't contend.
#[derive(Debug)]
pub struct TimeSeriesStore {
    entries: RwLock<HashMap<SeriesKey, Arc<SeriesEntry>>>,
    retention: Duration,
    max_points: usize,
}

impl TimeSeriesStore {
    /// Create a new, empty [`TimeSeriesStore`].
    ///
    /// # Arguments
    ///
    /// * `retention` - How far back from its newest sample, each series keeps points
    /// * `max_points` - Maximum amount of points kept per series
    pub fn new(retention: Duration, max_points: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
            max_points,
        }
    }

    async fn entry(&self, key: &SeriesKey) -> Option<Arc<SeriesEntry>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn entry_or_insert(&self, key: &SeriesKey) -> Arc<SeriesEntry> {
        if let Some(e) = self.entry(key).await {
            return e;
        }

        self.entries
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("Begin storing offsets of {key}");
                Arc::new(SeriesEntry {
                    series: RwLock::new(Arc::new(TimeSeries::new(self.retention, self.max_points))),
                    status: RwLock::new(SeriesStatus::default()),
                })
            })
            .clone()
    }

    /// Append a [`SamplePoint`] to the series of `key`, returning `false` if it was dropped.
    pub async fn append(&self, key: &SeriesKey, point: SamplePoint) -> bool {
        let entry = self.entry_or_insert(key).await;

        let mut w_guard = entry.series.write().await;
        let appended = Arc::make_mut(&mut *w_guard).push(point);
        if appended {
            trace!("Appended offset {} at '{}' to {key}", point.offset, point.instant);
        }
        appended
    }

    /// Immutable snapshot of the series of `key`, if it's tracked.
    pub async fn snapshot(&self, key: &SeriesKey) -> Option<Arc<TimeSeries>> {
        match self.entry(key).await {
            Some(e) => Some(e.series.read().await.clone()),
            None => None,
        }
    }

    pub async fn set_status(&self, key: &SeriesKey, status: SeriesStatus) {
        let entry = self.entry_or_insert(key).await;
        let mut w_guard = entry.status.write().await;
        if *w_guard != status {
            debug!("Status of {key}: {} -> {status}", *w_guard);
            *w_guard = status;
        }
    }

    pub async fn status(&self, key: &SeriesKey) -> Option<SeriesStatus> {
        match self.entry(key).await {
            Some(e) => Some(e.status.read().await.clone()),
            None => None,
        }
    }

    /// Forget the series of `key`.
    ///
    /// Snapshots already handed out stay valid.
    pub async fn remove(&self, key: &SeriesKey) -> bool {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            debug!("Stopped storing offsets of {key}");
        }
        removed
    }

    pub async fn keys(&self) -> Vec<SeriesKey> {
        self.entries.read().await.keys().cloned().collect()
    }
}
