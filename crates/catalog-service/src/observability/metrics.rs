//! Metrics definitions for the catalog service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `catalog_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 2 values (allow, deny)
//! - `reason`: 5 values (none, unauthenticated, insufficient_scope, invalid_token, expired)
//! - `status`: bounded by code (success, error, or a key source failure kind)
//! - `failed_check`: bounded by verifier and validator names

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. JWKS refresh buckets
/// cover a fast cache-fill up to the maximum fetch timeout.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("catalog_jwks_refresh".to_string()),
            &[
                0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000, 60.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record a request gate decision
///
/// Metric: `catalog_authorization_decisions_total`
/// Labels: `outcome`, `reason`
///
/// `reason` is `none` for allowed requests.
pub fn record_authorization_decision(outcome: &str, reason: &str) {
    counter!("catalog_authorization_decisions_total",
        "outcome" => outcome.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record the result of verifying and validating a presented token
///
/// Metric: `catalog_token_validations_total`
/// Labels: `status`, `failed_check`
pub fn record_token_validation(status: &str, failed_check: &str) {
    counter!("catalog_token_validations_total",
        "status" => status.to_string(),
        "failed_check" => failed_check.to_string()
    )
    .increment(1);
}

// ============================================================================
// Key Source Metrics
// ============================================================================

/// Record a JWKS refresh attempt
///
/// Metric: `catalog_jwks_refresh_total`, `catalog_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("catalog_jwks_refresh_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("catalog_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
