//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let metrics_path = state.config.metrics_path();
    let rule_count = state.aggregator.namer().len();

    // Calculate actual uptime from service start time
    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Process Group Exporter</title>
    <style>
        body {{ font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 760px; margin: 0 auto; background: white; padding: 32px; border-radius: 8px; }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 12px; }}
        .info span {{ margin-right: 24px; color: #555; }}
        li {{ margin: 12px 0; }}
        a {{ color: #007bff; font-weight: 600; text-decoration: none; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Process Group Exporter</h1>
    <div class="info">
        <span>Version: <b>{version}</b></span>
        <span>Uptime: <b>{uptime}</b></span>
        <span>Rules: <b>{rules}</b></span>
    </div>
    <ul>
        <li><a href="{metrics}">{metrics}</a> Prometheus metrics, one aggregation pass per scrape</li>
        <li><a href="/health">/health</a> Exporter internal statistics (text)</li>
    </ul>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        rules = rule_count,
        metrics = metrics_path,
    );

    Html(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{body_text, fake_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_root_page_links() {
        let (_dir, state) = fake_state();

        let response = root_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains(r#"href="/metrics""#));
        assert!(body.contains(r#"href="/health""#));
        assert!(body.contains(env!("CARGO_PKG_VERSION")));
    }
}
