//! Current caller handler.

use crate::auth::Principal;
use crate::errors::CatalogError;
use crate::middleware::PrincipalExt;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    /// Token subject.
    pub sub: String,

    /// Granted authorities, sorted.
    pub authorities: Vec<String>,
}

/// Handler for GET /api/v1/me
///
/// Returns the caller's subject and authorities.
///
/// GET routes may be public under the configured policy, in which case the
/// gate lets anonymous requests through; those get 401 here.
///
/// ```json
/// { "sub": "user-1", "authorities": ["SCOPE_read", "SCOPE_write"] }
/// ```
#[instrument(skip_all, name = "catalog.handlers.me")]
pub async fn get_me(
    principal: Option<Extension<Principal>>,
) -> Result<Json<MeResponse>, CatalogError> {
    let principal = principal.principal().ok_or(CatalogError::Unauthenticated)?;

    tracing::debug!(target: "catalog.handlers.me", "Returning caller identity");

    Ok(Json(MeResponse {
        sub: principal.subject().to_string(),
        authorities: principal
            .authorities()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Authorities;

    #[tokio::test]
    async fn test_get_me_returns_identity() {
        let principal = Principal::new(
            "user-1",
            ["SCOPE_write", "SCOPE_read"].into_iter().collect::<Authorities>(),
        );

        let Json(response) = get_me(Some(Extension(principal))).await.unwrap();

        assert_eq!(response.sub, "user-1");
        assert_eq!(response.authorities, vec!["SCOPE_read", "SCOPE_write"]);
    }

    #[tokio::test]
    async fn test_get_me_without_principal() {
        let result = get_me(None).await;

        assert!(matches!(result, Err(CatalogError::Unauthenticated)));
    }
}
