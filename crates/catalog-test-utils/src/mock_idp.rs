//! Mocked OIDC identity provider
//!
//! A `wiremock` server publishing a discovery document and a JWKS.

use crate::crypto_fixtures::TestKeypair;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Discovery document path, relative to the issuer.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// JWKS path on the mock server.
pub const JWKS_PATH: &str = "/jwks";

/// Mock identity provider.
///
/// The issuer is the server URI with a trailing slash. Discovery is mounted
/// on start; key sets are mounted per test.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::start().await;
/// idp.mount_jwks_expecting(&[&keypair], 1, Duration::from_millis(200)).await;
/// // ... concurrent requests ...
/// idp.verify().await;
/// ```
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start the server with a discovery document for its own issuer.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let idp = Self { server };
        let issuer = idp.issuer();
        idp.mount_discovery(&issuer).await;
        idp
    }

    /// Start the server with a discovery document naming `issuer` instead.
    pub async fn start_with_discovered_issuer(issuer: &str) -> Self {
        let server = MockServer::start().await;
        let idp = Self { server };
        idp.mount_discovery(issuer).await;
        idp
    }

    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve a JWKS with `keypairs`.
    pub async fn mount_jwks(&self, keypairs: &[&TestKeypair]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(keypairs))
            .mount(&self.server)
            .await;
    }

    /// Serve a JWKS with `keypairs` after `delay`.
    pub async fn mount_jwks_delayed(&self, keypairs: &[&TestKeypair], delay: Duration) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(keypairs).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Serve a JWKS with `keypairs` after `delay`, expecting exactly
    /// `expected_calls` fetches. Checked by [`Self::verify`] or on drop.
    pub async fn mount_jwks_expecting(
        &self,
        keypairs: &[&TestKeypair],
        expected_calls: u64,
        delay: Duration,
    ) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(jwks_response(keypairs).set_delay(delay))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Answer JWKS fetches with `status`, at most `times` times.
    pub async fn mount_jwks_failure(&self, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Drop every mock and remount discovery. Use to rotate the key set.
    pub async fn reset(&self) {
        self.server.reset().await;
        let issuer = self.issuer();
        self.mount_discovery(&issuer).await;
    }

    /// Panic if any `expect`ed call count was not met.
    pub async fn verify(&self) {
        self.server.verify().await;
    }

    /// Number of JWKS requests received so far.
    pub async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == JWKS_PATH)
            .count()
    }

    async fn mount_discovery(&self, issuer: &str) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": issuer,
                "jwks_uri": self.jwks_uri(),
            })))
            .mount(&self.server)
            .await;
    }
}

fn jwks_response(keypairs: &[&TestKeypair]) -> ResponseTemplate {
    let keys: Vec<serde_json::Value> = keypairs.iter().map(|k| k.jwk_json()).collect();
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys }))
}
