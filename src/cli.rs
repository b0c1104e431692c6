use std::net::{IpAddr, SocketAddr};

use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use rdkafka::ClientConfig;
use tokio::time::Duration;

use crate::constants::{
    DEFAULT_HISTORY, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_IDLE_TIMEOUT_SECS,
    DEFAULT_INSTANTS, DEFAULT_INSTANTS_LEAD_SECS, DEFAULT_INSTANTS_STEP_SECS,
    DEFAULT_PARTITION_COUNT_TTL_SECS, DEFAULT_REPORT_INTERVAL_SECS, DEFAULT_RETENTION_SECS,
    DEFAULT_SAMPLING_INTERVAL_SECS,
};
use lagtrace::engine::SamplingInstantsConfig;
use lagtrace::sampler::SamplerConfig;

/// Upper bound of every argument expressed in seconds (~100 years).
const MAX_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Upper bound of `--instants`.
const MAX_INSTANTS: u64 = 10_000;

/// Command Line Interface, defined via the declarative,
/// `derive` based functionality of the `clap` crate.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("logging_flags")
        .required(false)
        .multiple(false)
        .args(["verbose", "quiet"]),
))]
pub struct Cli {
    // ------------------------------------------------------------------------ Kafka configuration
    /// Initial Kafka Brokers to connect to (format: 'HOST:PORT,...').
    ///
    /// Equivalent to '--kafka-conf=bootstrap.servers:host:port,...'.
    #[arg(short, long = "brokers", value_name = "BOOTSTRAP_BROKERS")]
    pub bootstrap_brokers: String,

    /// Client identifier used by the internal Kafka Clients.
    ///
    /// Equivalent to '--kafka-conf=client.id:my-client-id'.
    #[arg(long = "client-id", value_name = "CLIENT_ID", default_value = env!("CARGO_PKG_NAME"))]
    pub client_id: String,

    /// Additional configuration used by the internal Kafka Clients (format: 'CONF_KEY:CONF_VAL').
    ///
    /// To set multiple configurations keys, use this argument multiple times.
    /// See: https://github.com/edenhill/librdkafka/blob/master/CONFIGURATION.md.
    #[arg(
        long = "kafka-conf",
        value_name = "CONF_KEY:CONF_VAL",
        value_parser = kv_clap_value_parser,
        verbatim_doc_comment
    )]
    pub kafka_config: Vec<KVPair>,

    // ----------------------------------------------------------------------------------- Sampling
    /// Seconds between 2 samples of the same offset series.
    #[arg(
        long = "sampling-interval",
        value_name = "SECONDS",
        default_value = DEFAULT_SAMPLING_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
    )]
    pub sampling_interval_secs: u64,

    /// Seconds of offsets history retained for each series, measured from its most recent sample.
    ///
    /// Instants older than this can't be estimated.
    #[arg(
        long = "retention",
        value_name = "SECONDS",
        default_value = DEFAULT_RETENTION_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECS),
        verbatim_doc_comment
    )]
    pub retention_secs: u64,

    /// Maximum number of samples retained for each series.
    ///
    /// Once this limit is reached, the oldest samples are discarded, realising
    /// a "moving window" of offsets history.
    #[arg(long = "history", value_name = "SIZE_PER_SERIES", default_value = DEFAULT_HISTORY, verbatim_doc_comment)]
    pub history: usize,

    /// Seconds a series can go without being queried, before it stops being sampled and is forgotten.
    #[arg(
        long = "idle-timeout",
        value_name = "SECONDS",
        default_value = DEFAULT_IDLE_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
    )]
    pub idle_timeout_secs: u64,

    /// Seconds the partition count of a Topic is cached for.
    #[arg(
        long = "partition-count-ttl",
        value_name = "SECONDS",
        default_value = DEFAULT_PARTITION_COUNT_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(0..=MAX_SECS)
    )]
    pub partition_count_ttl_secs: u64,

    // -------------------------------------------------------------------------- Sampling instants
    /// How many instants queries look at, to estimate lag and speed.
    #[arg(
        long = "instants",
        value_name = "COUNT",
        default_value = DEFAULT_INSTANTS,
        value_parser = clap::value_parser!(u64).range(2..=MAX_INSTANTS)
    )]
    pub instants: u64,

    /// Seconds between 2 consecutive instants queries look at.
    #[arg(
        long = "instants-step",
        value_name = "SECONDS",
        default_value = DEFAULT_INSTANTS_STEP_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
    )]
    pub instants_step_secs: u64,

    /// Seconds between "now" and the most recent instant queries look at.
    #[arg(
        long = "instants-lead",
        value_name = "SECONDS",
        default_value = DEFAULT_INSTANTS_LEAD_SECS,
        value_parser = clap::value_parser!(u64).range(0..=MAX_SECS)
    )]
    pub instants_lead_secs: u64,

    // ------------------------------------------------------------------------------------ Service
    /// Consumer Group and Topic to periodically report about (format: 'GROUP:TOPIC').
    ///
    /// To watch multiple pairs, use this argument multiple times.
    #[arg(long = "watch", value_name = "GROUP:TOPIC", value_parser = watch_clap_value_parser, verbatim_doc_comment)]
    pub watch: Vec<WatchTarget>,

    /// Seconds between 2 reports about the '--watch' targets.
    #[arg(
        long = "report-interval",
        value_name = "SECONDS",
        default_value = DEFAULT_REPORT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECS)
    )]
    pub report_interval_secs: u64,

    /// Host address to listen on for HTTP requests.
    ///
    /// Supports both IPv4 and IPv6 addresses.
    #[arg(long, default_value = DEFAULT_HTTP_HOST, verbatim_doc_comment)]
    pub host: IpAddr,

    /// Port to listen on for HTTP requests.
    #[arg(long, default_value = DEFAULT_HTTP_PORT, verbatim_doc_comment)]
    pub port: u16,

    /// Verbose logging.
    ///
    /// * none    = 'WARN'
    /// * '-v'    = 'INFO'
    /// * '-vv'   = 'DEBUG'
    /// * '-vvv'  = 'TRACE'
    ///
    /// Alternatively, set environment variable 'LAGTRACE_LOG=(ERROR|WARN|INFO|DEBUG|TRACE|OFF)'.
    #[arg(short, long, action = clap::ArgAction::Count, verbatim_doc_comment)]
    pub verbose: u8,

    /// Quiet logging.
    ///
    /// * none    = 'WARN'
    /// * '-q'    = 'ERROR'
    /// * '-qq'   = 'OFF'
    ///
    /// Alternatively, set environment variable 'LAGTRACE_LOG=(ERROR|WARN|INFO|DEBUG|TRACE|OFF)'.
    #[arg(short, long, action = clap::ArgAction::Count, verbatim_doc_comment)]
    pub quiet: u8,
}

impl Cli {
    /// Parse command line arguments, exiting with a usage error if they are not consistent.
    pub fn parse_and_validate() -> Self {
        let cli = Self::parse();

        if let Err(msg) = cli.validate() {
            Self::command().error(ErrorKind::ValueValidation, msg).exit();
        }

        cli
    }

    fn validate(&self) -> Result<(), String> {
        let oldest_instant_secs = (self.instants - 1)
            .checked_mul(self.instants_step_secs)
            .and_then(|span| span.checked_add(self.instants_lead_secs))
            .ok_or_else(|| "'--instants' and '--instants-step' span too long".to_string())?;
        if self.retention_secs < oldest_instant_secs {
            return Err(format!(
                "'--retention' ({}s) must cover the oldest instant queried ({}s ago)",
                self.retention_secs, oldest_instant_secs
            ));
        }

        Ok(())
    }

    pub fn verbosity_level(&self) -> i8 {
        self.verbose as i8 - self.quiet as i8
    }

    pub fn listen_on(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn build_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.bootstrap_brokers.clone())
            .set("client.id", self.client_id.clone());
        for cfg in &self.kafka_config {
            config.set(cfg.0.clone(), cfg.1.clone());
        }

        trace!("Created:\n{:#?}", config);
        config
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs as i64)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            sampling_interval: Duration::from_secs(self.sampling_interval_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }

    pub fn partition_count_ttl(&self) -> Duration {
        Duration::from_secs(self.partition_count_ttl_secs)
    }

    pub fn sampling_instants_config(&self) -> SamplingInstantsConfig {
        SamplingInstantsConfig {
            count: self.instants as usize,
            step: chrono::Duration::seconds(self.instants_step_secs as i64),
            lead: chrono::Duration::seconds(self.instants_lead_secs as i64),
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

/// A simple (key,value) pair of `String`s, useful to be parsed from arguments via [`kv_clap_value_parser`].
pub type KVPair = (String, String);

/// To be used as [`clap::value_parser`] function to create [`KVPair`] values.
fn kv_clap_value_parser(kv: &str) -> Result<KVPair, String> {
    let (k, v) = match kv.split_once(':') {
        None => {
            return Err("Should have 'K:V' format".to_string());
        },
        Some((k, v)) => (k, v),
    };

    Ok((k.to_string(), v.to_string()))
}

/// A Consumer Group and Topic pair, reported about periodically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub group: String,
    pub topic: String,
}

/// To be used as [`clap::value_parser`] function to create [`WatchTarget`] values.
///
/// Topic names can't contain ':', so the last one separates the Topic from the Group.
fn watch_clap_value_parser(gt: &str) -> Result<WatchTarget, String> {
    match gt.rsplit_once(':') {
        Some((g, t)) if !g.is_empty() && !t.is_empty() => Ok(WatchTarget {
            group: g.to_string(),
            topic: t.to_string(),
        }),
        _ => Err("Should have 'GROUP:TOPIC' format".to_string()),
    }
}
