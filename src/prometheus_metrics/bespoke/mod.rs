//! Metrics that can't be modelled with the `prometheus` crate types, because they carry
//! the timestamp of the sample they report: those are rendered straight into the text exposition format.

pub mod series_earliest_tracked_offset;
pub mod series_latest_tracked_offset;

use crate::kafka_types::SeriesKey;

use super::{LABEL_GROUP, LABEL_KIND, LABEL_PARTITION, LABEL_TOPIC};

pub(self) const TYPE_GAUGE: &str = "gauge";

pub(self) const HEADER_HELP: &str = "# HELP";
pub(self) const HEADER_TYPE: &str = "# TYPE";

/// Labels identifying a series, formatted for the text exposition format (without braces).
pub(self) fn series_labels(key: &SeriesKey) -> String {
    let tp = key.topic_partition();
    match key.group() {
        Some(group) => format!(
            "{LABEL_KIND}=\"{}\",{LABEL_GROUP}=\"{group}\",{LABEL_TOPIC}=\"{}\",{LABEL_PARTITION}=\"{}\"",
            key.kind(),
            tp.topic,
            tp.partition
        ),
        None => format!(
            "{LABEL_KIND}=\"{}\",{LABEL_TOPIC}=\"{}\",{LABEL_PARTITION}=\"{}\"",
            key.kind(),
            tp.topic,
            tp.partition
        ),
    }
}
