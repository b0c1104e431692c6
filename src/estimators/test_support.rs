use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::time_series::{SamplePoint, TimeSeries};

/// Instant `secs` seconds after a fixed reference.
pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Build a [`TimeSeries`] out of `(seconds, offset)` pairs.
pub(crate) fn build_series(retention_secs: i64, samples: &[(i64, i64)]) -> TimeSeries {
    let mut ts = TimeSeries::new(Duration::seconds(retention_secs), 1000);
    for (secs, offset) in samples {
        ts.push(SamplePoint::new(at(*secs), *offset));
    }
    ts
}
