//! JWT utilities shared by the catalog service and its test utilities.
//!
//! This module provides the pre-verification helpers used before a token is
//! handed to the signature check:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal claim validation
//! - Header inspection (`alg` + `kid`) without verifying the signature
//! - The explicit signing algorithm allow-list
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - `none` and symmetric (HMAC) algorithms are never accepted
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{inspect_header, is_accepted_algorithm};
//!
//! let header = inspect_header(token)?;
//! if !is_accepted_algorithm(&header.alg) {
//!     return Err("algorithm not allowed");
//! }
//! let key = key_source.resolve_key(&header.kid).await?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or
/// cryptographic operations.
///
/// - Typical identity provider access tokens are 700-1500 bytes (RS256)
/// - 8KB leaves room for large scope lists while bounding base64 decode work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (60 seconds).
///
/// Applied symmetrically to `exp`, `nbf` and `iat` checks.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Configuration above this value is rejected at start-up.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Signing algorithms accepted in a token header.
///
/// Anything else, including `none` and the `HS*` family, is rejected before a
/// key is looked up.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256", "RS384", "RS512", "EdDSA"];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token header names an algorithm outside [`ACCEPTED_ALGORITHMS`].
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,
}

// =============================================================================
// Header Types
// =============================================================================

/// The parts of a JWT header needed to pick a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signing algorithm named by the token (already checked against the allow-list).
    pub alg: String,

    /// Key ID used to look up the signing key.
    pub kid: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Returns true if `alg` is in [`ACCEPTED_ALGORITHMS`].
///
/// The comparison is exact; `rs256` or `None` are not accepted.
#[must_use]
pub fn is_accepted_algorithm(alg: &str) -> bool {
    ACCEPTED_ALGORITHMS.contains(&alg)
}

/// Read `alg` and `kid` from a JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - The algorithm is checked against the allow-list here, so a token asking
///   for `none` never reaches key resolution
/// - The token MUST still be verified after fetching the key
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, missing `alg`
/// - `UnsupportedAlgorithm` - `alg` is not in [`ACCEPTED_ALGORITHMS`]
/// - `MissingKid` - `kid` absent, empty, or not a string
pub fn inspect_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .alg
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .ok_or(JwtValidationError::MalformedToken)?;

    if !is_accepted_algorithm(alg) {
        tracing::debug!(target: "common.jwt", alg = %alg, "Token rejected: algorithm not allowed");
        return Err(JwtValidationError::UnsupportedAlgorithm);
    }

    // Reject empty kid values as well as missing ones
    let kid = header
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(TokenHeader {
        alg: alg.to_string(),
        kid,
    })
}

/// Decode an Ed25519 public key from JWK `x` field (base64url format).
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64url content cannot be decoded.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
