use std::fmt;

use super::TopicPartition;

/// Identifies one offset history tracked by the service.
///
/// The two kinds of series are sampled independently:
/// estimating the lag of a Consumer Group needs one of each.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeriesKey {
    /// Offset committed by a Consumer Group for a [`TopicPartition`].
    Consumer {
        group: String,
        topic_partition: TopicPartition,
    },

    /// End offset (log head) of a [`TopicPartition`].
    End {
        topic_partition: TopicPartition,
    },
}

impl SeriesKey {
    pub fn consumer(group: impl Into<String>, topic_partition: TopicPartition) -> Self {
        SeriesKey::Consumer {
            group: group.into(),
            topic_partition,
        }
    }

    pub fn end(topic_partition: TopicPartition) -> Self {
        SeriesKey::End {
            topic_partition,
        }
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        match self {
            SeriesKey::Consumer {
                topic_partition,
                ..
            } => topic_partition,
            SeriesKey::End {
                topic_partition,
            } => topic_partition,
        }
    }

    /// Short label of the kind of series, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SeriesKey::Consumer {
                ..
            } => "consumer",
            SeriesKey::End {
                ..
            } => "end",
        }
    }

    /// Consumer Group of the series, if it's a [`SeriesKey::Consumer`].
    pub fn group(&self) -> Option<&str> {
        match self {
            SeriesKey::Consumer {
                group,
                ..
            } => Some(group),
            SeriesKey::End {
                ..
            } => None,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Consumer {
                group,
                topic_partition,
            } => write!(f, "consumer '{group}' of '{topic_partition}'"),
            SeriesKey::End {
                topic_partition,
            } => write!(f, "end of '{topic_partition}'"),
        }
    }
}
