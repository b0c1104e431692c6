use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

use lagtrace::prometheus_metrics::bespoke::*;
use lagtrace::time_series::TimeSeriesStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct HttpServiceState {
    store: Arc<TimeSeriesStore>,
    metrics: Arc<Registry>,
}

/// Serve the HTTP endpoints on `listen_on`, until `shutdown_token` is cancelled.
pub async fn init(
    listen_on: SocketAddr,
    store: Arc<TimeSeriesStore>,
    shutdown_token: CancellationToken,
    metrics: Arc<Registry>,
) -> std::io::Result<()> {
    let state = HttpServiceState {
        store,
        metrics,
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/metrics", get(prometheus_metrics))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state);

    let listener = TcpListener::bind(listen_on).await?;

    info!("Begin listening on '{}'...", listen_on);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await
}

async fn root() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

async fn prometheus_metrics(State(state): State<HttpServiceState>) -> impl IntoResponse {
    let mut status = StatusCode::OK;
    let mut headers = HeaderMap::new();

    // As defined by Prometheus: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#basic-info
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));

    // Snapshots are taken once, and reused by every metric that needs them
    let mut snapshots = Vec::new();
    for key in state.store.keys().await {
        if let Some(series) = state.store.snapshot(&key).await {
            snapshots.push((key, series));
        }
    }

    let metric_types_count: usize = 2;
    let mut body: Vec<String> =
        Vec::with_capacity(snapshots.len() * metric_types_count + metric_types_count * 2);

    // ---------------------------------------------------- METRIC: series_earliest_tracked_offset
    series_earliest_tracked_offset::append_headers(&mut body);
    for (key, series) in snapshots.iter() {
        if let Some(point) = series.earliest() {
            series_earliest_tracked_offset::append_metric(key, point, &mut body);
        }
    }

    // ------------------------------------------------------ METRIC: series_latest_tracked_offset
    series_latest_tracked_offset::append_headers(&mut body);
    for (key, series) in snapshots.iter() {
        if let Some(point) = series.latest() {
            series_latest_tracked_offset::append_metric(key, point, &mut body);
        }
    }

    // Turn the bespoke metrics created so far, into a String
    let mut body = body.join("\n");
    body.push('\n');

    // Append to the bespoke metrics, classic Prometheus Metrics
    let metrics_family = state.metrics.gather();
    if let Err(e) = TextEncoder.encode_utf8(&metrics_family, &mut body) {
        status = StatusCode::INTERNAL_SERVER_ERROR;
        body = format!("Failed to encode metrics: {e}");
    }

    (status, headers, body)
}
