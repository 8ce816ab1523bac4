//! Request gate: one authorization pass per request.
//!
//! ```text
//! Authorization header -> TokenVerifier -> ClaimsValidatorChain
//!                      -> map_authorities -> PolicyMatrix -> Decision
//! ```
//!
//! A missing header or a non-Bearer scheme is not an error: the request is
//! simply unauthenticated and the policy decides. A presented token that
//! fails verification or validation is also treated as unauthenticated, but
//! when the policy then denies for lack of authentication the reason is
//! upgraded to the token failure (`InvalidToken` or `Expired`).

use crate::auth::authorities::{map_authorities, Authorities};
use crate::auth::jwt::TokenVerifier;
use crate::auth::validators::ClaimsValidatorChain;
use crate::observability::metrics;
use crate::policy::{Decision, DenyReason, PolicyMatrix};
use axum::http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// The authenticated caller, attached to request extensions on Allow.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    authorities: Authorities,
}

impl Principal {
    pub fn new(subject: impl Into<String>, authorities: Authorities) -> Self {
        Self {
            subject: subject.into(),
            authorities,
        }
    }

    /// The token's `sub` claim, empty when the token carries none.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn authorities(&self) -> &Authorities {
        &self.authorities
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// Redacts the subject.
impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("subject", &"[REDACTED]")
            .field("authorities", &self.authorities)
            .finish()
    }
}

/// Result of [`RequestGate::authorize`].
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub decision: Decision,

    /// Present only when the request is allowed and carried a valid token.
    pub principal: Option<Principal>,
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively; anything other than a
/// non-empty Bearer credential yields `None`.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Composes the verifier, validator chain, authority mapper and policy.
pub struct RequestGate {
    verifier: TokenVerifier,
    validators: ClaimsValidatorChain,
    policy: Arc<PolicyMatrix>,
}

impl RequestGate {
    pub fn new(
        verifier: TokenVerifier,
        validators: ClaimsValidatorChain,
        policy: Arc<PolicyMatrix>,
    ) -> Self {
        Self {
            verifier,
            validators,
            policy,
        }
    }

    pub fn policy(&self) -> &PolicyMatrix {
        &self.policy
    }

    /// Authorize one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn authorize(
        &self,
        method: &Method,
        path: &str,
        authorization: Option<&str>,
    ) -> GateOutcome {
        let authentication = match authorization.and_then(bearer_token) {
            Some(token) => Some(self.authenticate(token).await),
            None => None,
        };

        let empty = Authorities::empty();
        let (is_authenticated, authorities) = match &authentication {
            Some(Ok(principal)) => (true, principal.authorities()),
            _ => (false, &empty),
        };

        let decision = match (
            self.policy
                .decide(method, path, is_authenticated, authorities),
            &authentication,
        ) {
            (Decision::Deny(DenyReason::Unauthenticated), Some(Err(token_failure))) => {
                Decision::Deny(*token_failure)
            }
            (decision, _) => decision,
        };

        match decision {
            Decision::Allow => metrics::record_authorization_decision("allow", "none"),
            Decision::Deny(reason) => {
                tracing::debug!(
                    target: "catalog.auth.gate",
                    reason = reason.as_str(),
                    "Request denied"
                );
                metrics::record_authorization_decision("deny", reason.as_str());
            }
        }

        let principal = match (decision, authentication) {
            (Decision::Allow, Some(Ok(principal))) => Some(principal),
            _ => None,
        };

        GateOutcome {
            decision,
            principal,
        }
    }

    /// Verify and validate a presented token.
    ///
    /// On failure returns the deny reason the token would surface as.
    async fn authenticate(&self, token: &str) -> Result<Principal, DenyReason> {
        let claims = self.verifier.verify(token).await.map_err(|e| {
            tracing::debug!(
                target: "catalog.auth.gate",
                failed_check = e.failed_check(),
                "Token verification failed"
            );
            metrics::record_token_validation("failure", e.failed_check());
            DenyReason::InvalidToken
        })?;

        self.validators.validate(&claims).map_err(|rejection| {
            metrics::record_token_validation("failure", rejection.check.as_str());
            if rejection.check.is_temporal() {
                DenyReason::Expired
            } else {
                DenyReason::InvalidToken
            }
        })?;

        metrics::record_token_validation("success", "none");
        let authorities = map_authorities(&claims);
        Ok(Principal::new(claims.sub.unwrap_or_default(), authorities))
    }
}
