//! Health check endpoint handler.
//!
//! Returns exporter statistics as plain text. Passes only run when the
//! metrics path is scraped, so the status is 200 as soon as the server is
//! up and the body reports whether a pass has run yet.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.health_stats.record_http_request();

    let scraped = state.health_stats.total_scrapes.load(Ordering::Relaxed) > 0;
    let status = StatusCode::OK;
    let message = if scraped {
        "OK"
    } else {
        "OK - Waiting for first scrape"
    };

    let uptime_hours = state.health_stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = state.health_stats.render_table();
    let rules = state.aggregator.namer().len();
    let errors = state.aggregator.errors().get();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nRules: {rules}\nScrape errors: {errors}\n\n{table}"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::metrics_handler;
    use crate::handlers::test_support::{body_text, fake_state};

    #[tokio::test]
    async fn test_health_ok_before_first_scrape() {
        let (_dir, state) = fake_state();

        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.starts_with("OK - Waiting for first scrape"));
        assert!(body.contains("Rules: 1"));
    }

    #[tokio::test]
    async fn test_health_after_scrape() {
        let (_dir, state) = fake_state();

        metrics_handler(State(state.clone())).await.expect("Scrape failed");

        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.starts_with("OK\n"));
        assert!(!body.contains("Waiting for first scrape"));
        assert!(body.contains("AGGREGATION PASSES"));
    }
}
