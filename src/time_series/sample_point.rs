use chrono::{DateTime, Utc};

/// An offset observed at a specific instant.
///
/// Depending on the [`crate::kafka_types::SeriesKey`] it belongs to, this is either
/// the offset committed by a Consumer Group, or the end offset of a Topic Partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SamplePoint {
    pub instant: DateTime<Utc>,
    pub offset: i64,
}

impl SamplePoint {
    pub fn new(instant: DateTime<Utc>, offset: i64) -> Self {
        Self {
            instant,
            offset,
        }
    }
}

/// Result of a call to [`search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePointSearchRes {
    /// Instant found, it was part of the search input.
    Exact(SamplePoint),

    /// Instant not found, but the 2 [`SamplePoint`] around it were found.
    Range(SamplePoint, SamplePoint),

    /// Instant precedes the first [`SamplePoint`].
    Before,

    /// Instant follows the last [`SamplePoint`].
    After,

    /// Nothing to search.
    Empty,
}

/// Search an instant (`needle`) inside a slice of [`SamplePoint`] (`haystack`) sorted by instant.
///
/// # Arguments
///
/// * `needle` - Instant we are searching for
/// * `haystack` - Slice of [`SamplePoint`] to search, with strictly increasing instants
pub fn search(needle: DateTime<Utc>, haystack: &[SamplePoint]) -> SamplePointSearchRes {
    if haystack.is_empty() {
        return SamplePointSearchRes::Empty;
    }

    match haystack.binary_search_by_key(&needle, |sp| sp.instant) {
        Ok(idx) => SamplePointSearchRes::Exact(haystack[idx]),
        Err(0) => SamplePointSearchRes::Before,
        Err(idx) if idx == haystack.len() => SamplePointSearchRes::After,
        Err(idx) => SamplePointSearchRes::Range(haystack[idx - 1], haystack[idx]),
    }
}
