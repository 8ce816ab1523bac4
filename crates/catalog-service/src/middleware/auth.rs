//! Authorization middleware.
//!
//! Runs the [`RequestGate`] for every request. A denied request is answered
//! here and never reaches a handler. An allowed request carrying a valid
//! token gets the [`Principal`] inserted into its extensions.

use crate::auth::{Principal, RequestGate};
use crate::errors::CatalogError;
use crate::policy::Decision;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;
use tracing::instrument;

/// Gate middleware, installed with `middleware::from_fn_with_state`.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` when authentication is required and missing,
///   invalid or expired
/// - 403 with `WWW-Authenticate: Bearer error="insufficient_scope"` when the
///   required authority is missing
/// - Otherwise the handler's response
#[instrument(skip_all, name = "catalog.middleware.auth")]
pub async fn authorize(
    State(gate): State<Arc<RequestGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let outcome = gate
        .authorize(req.method(), req.uri().path(), authorization)
        .await;

    match outcome.decision {
        Decision::Deny(reason) => CatalogError::from(reason).into_response(),
        Decision::Allow => {
            if let Some(principal) = outcome.principal {
                req.extensions_mut().insert(principal);
            }
            next.run(req).await
        }
    }
}

/// Access to the caller's identity from handlers.
pub trait PrincipalExt {
    /// The authenticated principal, if the request carried a valid token.
    fn principal(&self) -> Option<&Principal>;

    fn is_authenticated(&self) -> bool {
        self.principal().is_some()
    }

    fn has_authority(&self, authority: &str) -> bool {
        self.principal()
            .is_some_and(|principal| principal.has_authority(authority))
    }
}

impl<B> PrincipalExt for axum::extract::Request<B> {
    fn principal(&self) -> Option<&Principal> {
        self.extensions().get::<Principal>()
    }
}

impl PrincipalExt for Option<Extension<Principal>> {
    fn principal(&self) -> Option<&Principal> {
        self.as_ref().map(|Extension(principal)| principal)
    }
}
