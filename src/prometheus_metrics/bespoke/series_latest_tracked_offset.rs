use const_format::formatcp;

use super::super::NAMESPACE;
use super::{series_labels, HEADER_HELP, HEADER_TYPE, TYPE_GAUGE};
use crate::kafka_types::SeriesKey;
use crate::time_series::SamplePoint;

const NAME: &str = formatcp!("{NAMESPACE}_series_latest_tracked_offset");
const HELP: &str =
    formatcp!("{HEADER_HELP} {NAME} Latest offset sampled and still retained for the series.");
const TYPE: &str = formatcp!("{HEADER_TYPE} {NAME} {TYPE_GAUGE}");

pub fn append_headers(res: &mut Vec<String>) {
    res.push(HELP.into());
    res.push(TYPE.into());
}

pub fn append_metric(key: &SeriesKey, point: &SamplePoint, res: &mut Vec<String>) {
    res.push(format!(
        "{NAME}{{{}}} {} {}",
        series_labels(key),
        point.offset,
        point.instant.timestamp_millis()
    ));
}
