//! Token verification.
//!
//! Checks the structure and signature of a bearer token using keys from the
//! [`KeySource`], producing [`Claims`] that are safe to inspect.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header algorithm must be in the allow-list AND equal the algorithm
//!   bound to the resolved key, which blocks `none` and algorithm downgrades
//! - Issuer, audience and time claims are NOT checked here; see
//!   [`crate::auth::validators`]
//! - Generic error messages prevent information leakage

use crate::auth::claims::Claims;
use crate::auth::jwks::{KeySource, SigningKey};
use common::jwt::{inspect_header, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Reasons a token failed verification.
///
/// Every variant renders the same client-facing message; [`VerifyError::failed_check`]
/// gives a bounded label for logs and metrics.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("The access token is invalid or expired")]
    Header(#[from] JwtValidationError),

    #[error("The access token is invalid or expired")]
    KeyUnavailable,

    #[error("The access token is invalid or expired")]
    AlgorithmMismatch,

    #[error("The access token is invalid or expired")]
    BadSignature,

    #[error("The access token is invalid or expired")]
    MalformedClaims,
}

impl VerifyError {
    pub fn failed_check(&self) -> &'static str {
        match self {
            VerifyError::Header(JwtValidationError::UnsupportedAlgorithm) => "algorithm",
            VerifyError::Header(_) => "structure",
            VerifyError::KeyUnavailable => "key",
            VerifyError::AlgorithmMismatch => "algorithm",
            VerifyError::BadSignature => "signature",
            VerifyError::MalformedClaims => "claims",
        }
    }
}

/// Verifies bearer tokens against the identity provider's keys.
pub struct TokenVerifier {
    key_source: Arc<KeySource>,
}

impl TokenVerifier {
    pub fn new(key_source: Arc<KeySource>) -> Self {
        Self { key_source }
    }

    /// Verify a token and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Read `alg` and `kid` from the header; `alg` must be allow-listed
    /// 3. Resolve the key by `kid`
    /// 4. Key algorithm must equal the header algorithm
    /// 5. Verify signature and deserialize claims
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] for any structural or cryptographic failure.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "catalog.auth.jwt", error = ?e, "Token header rejected");
            VerifyError::Header(e)
        })?;

        let algorithm = Algorithm::from_str(&header.alg)
            .map_err(|_| VerifyError::Header(JwtValidationError::UnsupportedAlgorithm))?;

        let key = self.key_source.resolve_key(&header.kid).await.map_err(|e| {
            tracing::debug!(target: "catalog.auth.jwt", error = %e, "No signing key for token");
            VerifyError::KeyUnavailable
        })?;

        let claims = verify_with_key(token, algorithm, &key)?;

        tracing::debug!(target: "catalog.auth.jwt", "Token signature verified");
        Ok(claims)
    }
}

/// Verify the signature of `token` with `key` and extract the claims.
///
/// Only the signature and claim shape are checked; temporal validation is
/// left to the validator chain so that it applies one documented skew.
pub(crate) fn verify_with_key(
    token: &str,
    algorithm: Algorithm,
    key: &SigningKey,
) -> Result<Claims, VerifyError> {
    if key.algorithm != algorithm {
        tracing::warn!(
            target: "catalog.auth.jwt",
            kid = %key.kid,
            header_alg = ?algorithm,
            key_alg = ?key.algorithm,
            "Token algorithm does not match key algorithm"
        );
        return Err(VerifyError::AlgorithmMismatch);
    }

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims::<&str>(&[]);

    let token_data = decode::<Claims>(token, &key.decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "catalog.auth.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidSignature => VerifyError::BadSignature,
            ErrorKind::Json(_) => VerifyError::MalformedClaims,
            _ => VerifyError::BadSignature,
        }
    })?;

    Ok(token_data.claims)
}
