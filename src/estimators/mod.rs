//! Estimates built on top of the offsets history kept in [`crate::time_series`].
//!
//! These are pure functions over [`crate::time_series::TimeSeries`] snapshots:
//! they never wait on the sampler.

// Inner modules
mod errors;
mod interpolator;
mod lag;
mod speed;
mod stats;
mod time_remaining;

#[cfg(test)]
pub(crate) mod test_support;

// Exports
pub use errors::{EstimatorError, EstimatorResult};
pub use interpolator::estimate;
pub use lag::{lags_at, LagSample};
pub use speed::{speed_stats, speeds_at, SpeedSample, SpeedStats};
pub use stats::DoubleStats;
pub use time_remaining::{
    messages_to_publish_timestamp, time_remaining, TimeRemaining, TimeRemainingStats,
};
