//! Claims validator chain.
//!
//! Runs after the signature check. Three validators are combined with AND
//! semantics and short-circuit in a fixed order: issuer, audience, temporal.
//! The audience slot can be swapped for a custom [`ClaimsValidator`] without
//! touching the other two.

use crate::auth::claims::Claims;
use chrono::Utc;
use std::fmt;
use std::time::Duration;

/// Which check rejected the claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedCheck {
    Issuer,
    Audience,
    Expiry,
    NotBefore,
    IssuedAt,
}

impl FailedCheck {
    /// Bounded label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FailedCheck::Issuer => "issuer",
            FailedCheck::Audience => "audience",
            FailedCheck::Expiry => "expiry",
            FailedCheck::NotBefore => "not_before",
            FailedCheck::IssuedAt => "issued_at",
        }
    }

    /// True for the time-based checks, which surface as an expired token.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FailedCheck::Expiry | FailedCheck::NotBefore | FailedCheck::IssuedAt
        )
    }
}

/// A validator's verdict against a set of claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsRejection {
    /// The check that failed.
    pub check: FailedCheck,

    /// Name of the validator that produced the rejection.
    pub validator: &'static str,
}

impl ClaimsRejection {
    pub fn new(validator: &'static str, check: FailedCheck) -> Self {
        Self { check, validator }
    }
}

impl fmt::Display for ClaimsRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} check failed ({})", self.check.as_str(), self.validator)
    }
}

impl std::error::Error for ClaimsRejection {}

/// A single claims check.
pub trait ClaimsValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Check `claims` at unix time `now`.
    fn validate(&self, claims: &Claims, now: i64) -> Result<(), ClaimsRejection>;
}

/// Accepts tokens whose `iss` equals the configured issuer exactly.
#[derive(Debug, Clone)]
pub struct IssuerValidator {
    issuer: String,
}

impl IssuerValidator {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }
}

impl ClaimsValidator for IssuerValidator {
    fn name(&self) -> &'static str {
        "issuer"
    }

    fn validate(&self, claims: &Claims, _now: i64) -> Result<(), ClaimsRejection> {
        if claims.iss == self.issuer {
            Ok(())
        } else {
            Err(ClaimsRejection::new(self.name(), FailedCheck::Issuer))
        }
    }
}

/// Accepts tokens whose `aud` contains at least one configured audience.
#[derive(Debug, Clone)]
pub struct AudienceValidator {
    audiences: Vec<String>,
}

impl AudienceValidator {
    pub fn new(audiences: Vec<String>) -> Self {
        Self { audiences }
    }
}

impl ClaimsValidator for AudienceValidator {
    fn name(&self) -> &'static str {
        "audience"
    }

    fn validate(&self, claims: &Claims, _now: i64) -> Result<(), ClaimsRejection> {
        if self.audiences.iter().any(|aud| claims.aud.contains(aud)) {
            Ok(())
        } else {
            Err(ClaimsRejection::new(self.name(), FailedCheck::Audience))
        }
    }
}

/// Checks `exp`, `nbf` and `iat` with a symmetric clock skew.
#[derive(Debug, Clone)]
pub struct TemporalValidator {
    skew_seconds: i64,
}

impl TemporalValidator {
    pub fn new(clock_skew: Duration) -> Self {
        Self {
            skew_seconds: i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX),
        }
    }
}

impl ClaimsValidator for TemporalValidator {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn validate(&self, claims: &Claims, now: i64) -> Result<(), ClaimsRejection> {
        let skew = self.skew_seconds;

        if now >= claims.exp.saturating_add(skew) {
            return Err(ClaimsRejection::new(self.name(), FailedCheck::Expiry));
        }

        if let Some(nbf) = claims.nbf {
            if now.saturating_add(skew) < nbf {
                return Err(ClaimsRejection::new(self.name(), FailedCheck::NotBefore));
            }
        }

        if let Some(iat) = claims.iat {
            if iat > now.saturating_add(skew) {
                return Err(ClaimsRejection::new(self.name(), FailedCheck::IssuedAt));
            }
        }

        Ok(())
    }
}

/// Issuer, audience and temporal validators combined with AND.
pub struct ClaimsValidatorChain {
    issuer: Box<dyn ClaimsValidator>,
    audience: Box<dyn ClaimsValidator>,
    temporal: Box<dyn ClaimsValidator>,
}

impl ClaimsValidatorChain {
    /// Build the standard chain.
    pub fn new(issuer: impl Into<String>, audiences: Vec<String>, clock_skew: Duration) -> Self {
        Self {
            issuer: Box::new(IssuerValidator::new(issuer)),
            audience: Box::new(AudienceValidator::new(audiences)),
            temporal: Box::new(TemporalValidator::new(clock_skew)),
        }
    }

    /// Replace the audience slot.
    #[must_use]
    pub fn with_audience_validator(mut self, validator: Box<dyn ClaimsValidator>) -> Self {
        self.audience = validator;
        self
    }

    /// Validate against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClaimsRejection`] in chain order.
    pub fn validate(&self, claims: &Claims) -> Result<(), ClaimsRejection> {
        self.validate_at(claims, Utc::now().timestamp())
    }

    /// Validate against a fixed unix time.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClaimsRejection`] in chain order.
    pub fn validate_at(&self, claims: &Claims, now: i64) -> Result<(), ClaimsRejection> {
        for validator in [&self.issuer, &self.audience, &self.temporal] {
            validator.validate(claims, now).map_err(|rejection| {
                tracing::debug!(
                    target: "catalog.auth.validators",
                    validator = validator.name(),
                    check = rejection.check.as_str(),
                    "Claims rejected"
                );
                rejection
            })?;
        }
        Ok(())
    }
}
