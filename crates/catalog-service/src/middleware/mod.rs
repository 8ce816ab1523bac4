//! HTTP middleware for the catalog service.
//!
//! # Components
//!
//! - `auth` - Request gate applied to every route

pub mod auth;

pub use auth::{authorize, PrincipalExt};
