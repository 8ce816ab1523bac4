//! Observability module for the catalog service.
//!
//! # Privacy by Default
//!
//! Token contents and subjects never appear in metric labels or log fields.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `catalog_authorization_decisions_total` | Counter | `outcome`, `reason` | Gate decisions |
//! | `catalog_token_validations_total` | Counter | `status`, `failed_check` | Presented token outcomes |
//! | `catalog_jwks_refresh_total` | Counter | `status` | Key set fetches |
//! | `catalog_jwks_refresh_duration_seconds` | Histogram | `status` | Key set fetch latency |

pub mod metrics;

pub use metrics::init_metrics_recorder;
