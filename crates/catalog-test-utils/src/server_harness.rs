//! Test server harness for E2E testing
//!
//! Provides `TestCatalogServer` for spawning real catalog server instances
//! wired to a [`MockIdentityProvider`].

use crate::mock_idp::MockIdentityProvider;
use crate::token_builders::TestTokenBuilder;
use catalog_service::auth::{ClaimsValidatorChain, KeySource, RequestGate, TokenVerifier};
use catalog_service::config::Config;
use catalog_service::observability::init_metrics_recorder;
use catalog_service::repositories::CarRepository;
use catalog_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Audience the harness configures and `claims()` targets.
pub const TEST_AUDIENCE: &str = "catalog-api";

/// Global metrics handle for test servers.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            // Fails if a recorder is already installed in this process; fall
            // back to a standalone one.
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Test harness for spawning the catalog server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_public_read() -> Result<()> {
///     let idp = MockIdentityProvider::start().await;
///     let server = TestCatalogServer::spawn(&idp).await?;
///
///     let response = reqwest::get(format!("{}/cars", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestCatalogServer {
    addr: SocketAddr,
    config: Config,
    key_source: Arc<KeySource>,
    _handle: JoinHandle<()>,
}

impl TestCatalogServer {
    /// Spawn with the canonical policy, trusting `idp`.
    pub async fn spawn(idp: &MockIdentityProvider) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(idp, HashMap::new()).await
    }

    /// Spawn with extra environment variables layered over the defaults.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use `idp` as its issuer and `TEST_AUDIENCE` as its audience
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(
        idp: &MockIdentityProvider,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("OIDC_ISSUER_URL".to_string(), idp.issuer()),
            ("OIDC_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;
        let policy = config
            .load_policy()
            .map_err(|e| anyhow::anyhow!("Failed to load policy: {}", e))?;

        let key_source = Arc::new(KeySource::new(
            config.oidc_issuer_url.clone(),
            config.jwks_fetch_timeout,
        ));
        let gate = Arc::new(RequestGate::new(
            TokenVerifier::new(Arc::clone(&key_source)),
            ClaimsValidatorChain::new(
                config.oidc_issuer_url.clone(),
                config.oidc_audiences.clone(),
                config.jwt_clock_skew,
            ),
            Arc::new(policy),
        ));

        let state = Arc::new(AppState {
            cars: Arc::new(CarRepository::new()),
        });

        // Build routes using catalog-service's real route builder
        let app = routes::build_routes(state, gate, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            key_source,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's key source, for driving key lookups directly.
    pub fn key_source(&self) -> &Arc<KeySource> {
        &self.key_source
    }

    /// Claims builder already targeting this server's issuer and audience.
    pub fn claims(&self) -> TestTokenBuilder {
        TestTokenBuilder::new(&self.config.oidc_issuer_url, TEST_AUDIENCE)
    }
}

impl Drop for TestCatalogServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}
