//! Catalog Service Library
//!
//! A car catalog API guarded by a bearer-token authorization gate:
//!
//! - OIDC discovery and JWKS key caching
//! - JWT signature verification and claims validation
//! - Scope to authority mapping
//! - An ordered, data-driven path/method authorization policy
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs (RequestGate) -> handlers/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key source, token verification, claims validation, request gate
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Gate middleware and `PrincipalExt`
//! - `models` - Data models
//! - `observability` - Prometheus metrics
//! - `policy` - Authorization policy matrix
//! - `repositories` - In-memory car storage
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod policy;
pub mod repositories;
pub mod routes;
