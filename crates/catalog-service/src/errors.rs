//! Catalog service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Authorization failures carry a fixed message per kind so validator
//! diagnostics never leak. Actual causes are logged where they happen.

use crate::policy::DenyReason;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` challenges.
const REALM: &str = "catalog-api";

/// Catalog service error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated, InvalidToken, Expired: 401 Unauthorized
/// - InsufficientScope: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - BadRequest: 400 Bad Request
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Insufficient scope")]
    InsufficientScope,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl CatalogError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::Unauthenticated | CatalogError::InvalidToken | CatalogError::Expired => {
                StatusCode::UNAUTHORIZED
            }
            CatalogError::InsufficientScope => StatusCode::FORBIDDEN,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Conflict(_) => StatusCode::CONFLICT,
            CatalogError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Bearer challenge for authorization failures.
    fn challenge(&self) -> Option<String> {
        match self {
            CatalogError::Unauthenticated => Some(format!("Bearer realm=\"{REALM}\"")),
            CatalogError::InvalidToken => Some(format!(
                "Bearer realm=\"{REALM}\", error=\"invalid_token\""
            )),
            CatalogError::Expired => Some(format!(
                "Bearer realm=\"{REALM}\", error=\"invalid_token\", error_description=\"The access token expired\""
            )),
            CatalogError::InsufficientScope => Some(format!(
                "Bearer realm=\"{REALM}\", error=\"insufficient_scope\""
            )),
            _ => None,
        }
    }
}

impl From<DenyReason> for CatalogError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => CatalogError::Unauthenticated,
            DenyReason::InsufficientScope => CatalogError::InsufficientScope,
            DenyReason::InvalidToken => CatalogError::InvalidToken,
            DenyReason::Expired => CatalogError::Expired,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            CatalogError::Unauthenticated => (
                "UNAUTHENTICATED",
                "Authentication is required to access this resource".to_string(),
            ),
            CatalogError::InvalidToken => (
                "INVALID_TOKEN",
                "The access token is invalid".to_string(),
            ),
            CatalogError::Expired => ("TOKEN_EXPIRED", "The access token has expired".to_string()),
            CatalogError::InsufficientScope => (
                "INSUFFICIENT_SCOPE",
                "The access token does not grant the required scope".to_string(),
            ),
            CatalogError::NotFound(resource) => ("NOT_FOUND", resource.clone()),
            CatalogError::Conflict(reason) => ("CONFLICT", reason.clone()),
            CatalogError::BadRequest(reason) => ("BAD_REQUEST", reason.clone()),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if let Some(challenge) = self.challenge() {
            if let Ok(header_value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}
