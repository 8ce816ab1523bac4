//! Prometheus metrics endpoint handler.
//!
//! This endpoint is public so Prometheus can scrape it. Metric labels are
//! bounded enums; subjects and tokens are never exposed.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns 200 OK with Prometheus text format:
/// ```text
/// # TYPE catalog_authorization_decisions_total counter
/// catalog_authorization_decisions_total{outcome="allow",reason="none"} 42
/// ```
#[tracing::instrument(skip_all, name = "catalog.handlers.metrics")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
