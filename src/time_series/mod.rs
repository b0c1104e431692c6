// Inner modules
mod sample_point;
mod series;
mod store;

// Exports
pub use sample_point::{search, SamplePoint, SamplePointSearchRes};
pub use series::TimeSeries;
pub use store::{SeriesStatus, TimeSeriesStore};
