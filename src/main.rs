#[macro_use]
extern crate log;

mod cli;
mod constants;
mod http;
mod logging;
mod watch;

use std::error::Error;
use std::sync::Arc;

use lagtrace::broker::{BrokerOffsetClient, KafkaBrokerClient};
use lagtrace::engine::LagEngine;
use lagtrace::internals::{Clock, SystemClock};
use lagtrace::partition_resolver::PartitionResolver;
use lagtrace::prometheus_metrics;
use lagtrace::sampler::OffsetSampler;
use lagtrace::time_series::TimeSeriesStore;
use tokio_util::sync::CancellationToken;

use cli::Cli;
use watch::WatchReporter;

#[tokio::main]
async fn main() {
    let cli = parse_cli_and_init_logging();

    let shutdown_token = build_shutdown_token();

    match run(cli, shutdown_token).await {
        Ok(()) => {
            info!("Shutdown complete");
            std::process::exit(exit_code::SUCCESS);
        },
        Err(e) => {
            error!("Terminating: {e}");
            std::process::exit(exit_code::SOFTWARE_ERROR);
        },
    }
}

async fn run(cli: Cli, shutdown_token: CancellationToken) -> Result<(), Box<dyn Error>> {
    let metrics = Arc::new(prometheus_metrics::init());

    let broker: Arc<dyn BrokerOffsetClient> =
        Arc::new(KafkaBrokerClient::new(cli.build_client_config())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(TimeSeriesStore::new(cli.retention(), cli.history));

    let sampler = Arc::new(OffsetSampler::new(
        broker.clone(),
        store.clone(),
        clock.clone(),
        cli.sampler_config(),
        shutdown_token.child_token(),
        metrics.clone(),
    ));
    let resolver = PartitionResolver::new(broker, cli.partition_count_ttl());
    let engine = Arc::new(LagEngine::new(
        resolver,
        sampler.clone(),
        store.clone(),
        clock,
        cli.sampling_instants_config(),
    ));

    if cli.watch.is_empty() {
        warn!("No '--watch' target: nothing will be sampled");
    }
    let reporter_handle = WatchReporter::new(engine, cli.watch.clone(), cli.report_interval())
        .spawn(shutdown_token.child_token());

    let served = http::init(cli.listen_on(), store, shutdown_token.clone(), metrics).await;

    // The HTTP service returns either on shutdown or on failure: stop everything else either way
    shutdown_token.cancel();
    sampler.shutdown().await;
    reporter_handle.await?;

    Ok(served?)
}

fn parse_cli_and_init_logging() -> Cli {
    // Parse command line input and initialize logging
    let cli = Cli::parse_and_validate();
    logging::init(cli.verbosity_level());

    trace!("Created:\n{:#?}", cli);

    cli
}

fn build_shutdown_token() -> CancellationToken {
    let shutdown_token = CancellationToken::new();

    // Setup shutdown signal handler:
    // when it's time to shutdown, cancel the root token, and with it all its children.
    //
    // NOTE: This handler will be listening on its own dedicated thread.
    let handler_token = shutdown_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutting down...");
        handler_token.cancel();
    }) {
        error!("Failed to register signal handler: {e}");
    }

    shutdown_token
}
