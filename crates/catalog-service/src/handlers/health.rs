//! Liveness probe.

use tracing::instrument;

/// Handler for GET /health
///
/// Returns `OK` while the process is serving. Never touches the identity
/// provider, so a provider outage does not fail the probe.
#[instrument(skip_all, name = "catalog.handlers.health")]
pub async fn health_check() -> &'static str {
    "OK"
}
