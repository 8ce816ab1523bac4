//! Request authorization.
//!
//! - `jwks` - Key source (OIDC discovery + JWKS cache)
//! - `jwt` - Token signature verification
//! - `claims` - Claims types
//! - `validators` - Issuer, audience and temporal checks
//! - `authorities` - Scope to authority mapping
//! - `gate` - Per-request orchestration and the `Principal`

pub mod authorities;
pub mod claims;
pub mod gate;
pub mod jwks;
pub mod jwt;
pub mod validators;

pub use authorities::{map_authorities, Authorities};
pub use claims::Claims;
pub use gate::{GateOutcome, Principal, RequestGate};
pub use jwks::KeySource;
pub use jwt::TokenVerifier;
pub use validators::{ClaimsValidator, ClaimsValidatorChain};
