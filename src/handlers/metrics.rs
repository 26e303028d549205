//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one aggregation pass over the process table on the
//! blocking pool, records the result and encodes the registry.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    PassFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let msg = match self {
            MetricsError::PassFailed => "Failed to collect process metrics",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
    }
}

/// Handler for the metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    debug!("Processing metrics request");
    state.health_stats.record_http_request();
    state.health_stats.record_metrics_endpoint_call();

    // Held until the registry is encoded
    let _guard = state.scrape_lock.lock().await;

    let start = Instant::now();
    let aggregator = Arc::clone(&state.aggregator);
    let result = tokio::task::spawn_blocking(move || aggregator.read_proc_groups())
        .await
        .map_err(|e| {
            error!("Aggregation pass panicked: {}", e);
            MetricsError::PassFailed
        })?;
    let elapsed = start.elapsed().as_secs_f64();

    state.metrics.record(&result);
    state.metrics.scrape_duration_seconds.set(elapsed);
    state.health_stats.record_scrape(
        result.scanned,
        result.matched,
        result.groups.len(),
        elapsed,
        result.scrape_errors,
    );

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    TextEncoder::new()
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|e| {
            error!("Failed to encode metrics: {}", e);
            MetricsError::EncodingFailed
        })?;

    let body = String::from_utf8(buffer).map_err(|e| {
        error!("Metrics output is not valid UTF-8: {}", e);
        MetricsError::EncodingFailed
    })?;

    debug!(
        "Served {} groups ({} of {} processes matched) in {:.3}s",
        result.groups.len(),
        result.matched,
        result.scanned,
        elapsed
    );
    Ok(body)
}
