//! Estimates the lag of Kafka Consumer Groups, their consumption speed, and how long they need
//! to reach a message published at a given instant.
//!
//! The Kafka Cluster does not keep any history of committed or end offsets: the
//! [`sampler::OffsetSampler`] builds one in background, for the series that are being queried,
//! and the [`engine::LagEngine`] answers queries interpolating over it.

#[macro_use]
extern crate log;

pub mod broker;
pub mod engine;
pub mod estimators;
pub mod internals;
pub mod kafka_types;
pub mod partition_resolver;
pub mod prometheus_metrics;
pub mod sampler;
pub mod time_series;
