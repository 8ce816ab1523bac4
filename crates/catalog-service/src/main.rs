//! Catalog Service
//!
//! Entry point for the car catalog API.

use catalog_service::auth::{ClaimsValidatorChain, KeySource, RequestGate, TokenVerifier};
use catalog_service::config::Config;
use catalog_service::observability::init_metrics_recorder;
use catalog_service::repositories::CarRepository;
use catalog_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Catalog Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        oidc_issuer_url = %config.oidc_issuer_url,
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        jwks_fetch_timeout_seconds = config.jwks_fetch_timeout.as_secs(),
        policy_unmatched = ?config.policy_unmatched,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    let policy = config.load_policy().map_err(|e| {
        error!("Failed to load authorization policy: {}", e);
        e
    })?;
    info!(rules = policy.rules().len(), "Authorization policy loaded");

    // Keys are fetched lazily on first use
    let key_source = Arc::new(KeySource::new(
        config.oidc_issuer_url.clone(),
        config.jwks_fetch_timeout,
    ));
    let validators = ClaimsValidatorChain::new(
        config.oidc_issuer_url.clone(),
        config.oidc_audiences.clone(),
        config.jwt_clock_skew,
    );
    let gate = Arc::new(RequestGate::new(
        TokenVerifier::new(key_source),
        validators,
        Arc::new(policy),
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        cars: Arc::new(CarRepository::new()),
    });

    let app = routes::build_routes(state, gate, metrics_handle);

    info!("Catalog Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Catalog Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    }
}
