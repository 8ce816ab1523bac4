//! HTTP routes for the catalog service.
//!
//! Defines the Axum router and application state.

use crate::auth::RequestGate;
use crate::config::REQUEST_TIMEOUT;
use crate::handlers::{self, cars};
use crate::middleware;
use crate::repositories::CarRepository;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Car storage.
    pub cars: Arc<CarRepository>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` and `/metrics` - Operational endpoints, outside the gate
/// - `/api/v1/me` and `/cars/**` - Behind the request gate
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(
    state: Arc<AppState>,
    gate: Arc<RequestGate>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let operational_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).with_state(metrics_handle),
        );

    let gated_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route("/cars", post(cars::create_car).get(cars::list_cars))
        .route(
            "/cars/:object_id",
            get(cars::get_car)
                .put(cars::update_car)
                .delete(cars::delete_car),
        )
        .route("/cars/makes/:make", get(cars::cars_by_make))
        .route(
            "/cars/makes/:make/models/:model",
            get(cars::cars_by_make_and_model),
        )
        .route(
            "/cars/makes/:make/models/:model/years/:year",
            get(cars::cars_by_year),
        )
        .route(
            "/cars/makes/:make/models/:model/min-years/:min_year/max-years/:max_year",
            get(cars::cars_by_year_range),
        )
        .with_state(state)
        // Runs for unmatched paths too, so the unmatched-path policy applies
        // before the 404 fallback.
        .fallback(|| async { axum::http::StatusCode::NOT_FOUND })
        .layer(axum::middleware::from_fn_with_state(
            gate,
            middleware::authorize,
        ));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    operational_routes
        .merge(gated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{ClaimsValidatorChain, KeySource, TokenVerifier};
    use crate::config::Config;
    use crate::policy::{PolicyMatrix, UnmatchedPolicy};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Router whose key source can never resolve a key.
    fn offline_router() -> Router {
        let vars = HashMap::from([
            (
                "OIDC_ISSUER_URL".to_string(),
                "http://127.0.0.1:9/".to_string(),
            ),
            ("OIDC_AUDIENCE".to_string(), "catalog-api".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();

        let key_source = Arc::new(KeySource::new(
            config.oidc_issuer_url.clone(),
            Duration::from_millis(200),
        ));
        let gate = Arc::new(RequestGate::new(
            TokenVerifier::new(key_source),
            ClaimsValidatorChain::new(
                config.oidc_issuer_url.clone(),
                config.oidc_audiences.clone(),
                config.jwt_clock_skew,
            ),
            Arc::new(PolicyMatrix::canonical(UnmatchedPolicy::Deny).unwrap()),
        ));
        let state = Arc::new(AppState {
            cars: Arc::new(CarRepository::new()),
        });

        build_routes(state, gate, PrometheusBuilder::new().build_recorder().handle())
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"make":"Audi","model":"A4","year":2020}"#))
            .unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = offline_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_gate_runs_before_handlers() {
        let anonymous_write = offline_router()
            .oneshot(request("POST", "/cars"))
            .await
            .unwrap();
        assert_eq!(anonymous_write.status(), StatusCode::UNAUTHORIZED);

        let anonymous_read = offline_router()
            .oneshot(request("GET", "/cars"))
            .await
            .unwrap();
        assert_eq!(anonymous_read.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unreachable_identity_provider_is_invalid_token() {
        let mut req = request("POST", "/cars");
        req.headers_mut().insert(
            "authorization",
            "Bearer eyJhbGciOiJFZERTQSIsImtpZCI6ImtleS0wMSJ9.e30.c2ln"
                .parse()
                .unwrap(),
        );

        let response = offline_router().oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_authenticate = response.headers().get("www-authenticate").unwrap();
        assert!(www_authenticate
            .to_str()
            .unwrap()
            .contains("invalid_token"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = offline_router()
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
