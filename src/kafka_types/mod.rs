mod series_key;
mod topic_partition;

pub use series_key::SeriesKey;
pub use topic_partition::TopicPartition;
