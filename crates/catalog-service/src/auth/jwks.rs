//! Key source: discovers the identity provider's JWKS and caches its signing keys.
//!
//! The JWKS URI is read once from the issuer's OpenID Connect discovery
//! document (`{issuer}/.well-known/openid-configuration`). Keys are cached by
//! key ID for the life of the process; a lookup for an unknown key ID
//! triggers exactly one refresh of the whole key set.
//!
//! # Concurrency
//!
//! - Reads go through an `RwLock` and never see a partially built key set;
//!   a refresh builds the new map first and swaps it in under the write lock.
//! - Refreshes are serialized by a mutex. Callers record the refresh attempt
//!   counter before queueing; if it moved by the time they get the mutex, a
//!   refresh already ran on their behalf and they only re-read the cache.
//!   N concurrent misses therefore cost one outbound fetch.
//!
//! # Failure handling
//!
//! Discovery and JWKS fetches share one deadline (`fetch_timeout`). Every
//! failure is reported to the caller as "key not available"; there is no
//! background retry, the next miss simply tries again.

use crate::observability::metrics;
use common::jwt::decode_ed25519_public_key_jwk;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Path of the discovery document relative to the issuer URL.
const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Key source failures.
///
/// Callers treat every variant as "no key for this token"; the variants
/// exist for logs and metrics.
#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("Identity provider discovery failed: {0}")]
    Discovery(String),

    #[error("JWKS fetch failed: {0}")]
    Fetch(String),

    #[error("Key fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Signing key not found")]
    KeyNotFound,
}

impl KeySourceError {
    /// Bounded label for refresh metrics.
    fn metric_status(&self) -> &'static str {
        match self {
            KeySourceError::Discovery(_) => "discovery_error",
            KeySourceError::Fetch(_) => "fetch_error",
            KeySourceError::Timeout(_) => "timeout",
            KeySourceError::KeyNotFound => "not_found",
        }
    }
}

/// Subset of the OpenID Connect discovery document we rely on.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier; must equal the configured issuer.
    pub issuer: String,

    /// Location of the provider's JSON Web Key Set.
    pub jwks_uri: String,
}

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Curve name for OKP keys ("Ed25519").
    #[serde(default)]
    pub crv: Option<String>,

    /// Ed25519 public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is meant for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// A verification key ready for use with `jsonwebtoken`.
#[derive(Clone)]
pub struct SigningKey {
    /// Key ID from the JWKS.
    pub kid: String,

    /// The only algorithm this key verifies.
    pub algorithm: Algorithm,

    /// Decoding key material.
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a JWK, or explain why the JWK is unusable.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let kid = jwk
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| "missing kid".to_string())?
            .to_string();

        if let Some(key_use) = &jwk.key_use {
            if key_use != "sig" {
                return Err(format!("key use '{key_use}' is not 'sig'"));
            }
        }

        let (algorithm, decoding_key) = match jwk.kty.as_str() {
            "RSA" => {
                let algorithm = match jwk.alg.as_deref() {
                    None | Some("RS256") => Algorithm::RS256,
                    Some("RS384") => Algorithm::RS384,
                    Some("RS512") => Algorithm::RS512,
                    Some(other) => return Err(format!("unsupported RSA algorithm '{other}'")),
                };
                let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                    return Err("RSA key missing n or e".to_string());
                };
                let decoding_key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| format!("invalid RSA components: {e}"))?;
                (algorithm, decoding_key)
            }
            "OKP" => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return Err("OKP key is not Ed25519".to_string());
                }
                match jwk.alg.as_deref() {
                    None | Some("EdDSA") => {}
                    Some(other) => return Err(format!("unsupported OKP algorithm '{other}'")),
                }
                let x = jwk
                    .x
                    .as_deref()
                    .ok_or_else(|| "OKP key missing x".to_string())?;
                let public_key_bytes = decode_ed25519_public_key_jwk(x)
                    .map_err(|e| format!("invalid public key encoding: {e}"))?;
                (Algorithm::EdDSA, DecodingKey::from_ed_der(&public_key_bytes))
            }
            other => return Err(format!("unsupported key type '{other}'")),
        };

        Ok(Self {
            kid,
            algorithm,
            decoding_key,
        })
    }
}

/// Resolves signing keys for the configured issuer.
pub struct KeySource {
    /// Configured issuer URL.
    issuer_url: String,

    /// HTTP client for discovery and JWKS requests.
    http_client: reqwest::Client,

    /// Deadline for one refresh (discovery + JWKS).
    fetch_timeout: Duration,

    /// JWKS URI learned from discovery.
    jwks_uri: RwLock<Option<String>>,

    /// Current key set by key ID.
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,

    /// Serializes refreshes.
    refresh_lock: Mutex<()>,

    /// Number of completed refresh attempts (successful or not).
    refresh_attempts: AtomicU64,
}

impl KeySource {
    /// Create a key source for `issuer_url`.
    ///
    /// No network traffic happens until the first key lookup.
    pub fn new(issuer_url: String, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "catalog.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            issuer_url,
            http_client,
            fetch_timeout,
            jwks_uri: RwLock::new(None),
            keys: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
            refresh_attempts: AtomicU64::new(0),
        }
    }

    /// Get the signing key for `kid`.
    ///
    /// Serves from cache when possible; otherwise performs (or waits for) a
    /// single refresh and looks again.
    ///
    /// # Errors
    ///
    /// Any error means the key is not available and the token must be
    /// rejected.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeySourceError> {
        // Read the counter before the cache so a refresh finishing in between
        // is either visible in the cache or visible in the counter.
        let observed_attempts = self.refresh_attempts.load(Ordering::Acquire);

        if let Some(key) = self.cached(kid).await {
            tracing::debug!(target: "catalog.auth.jwks", "JWKS cache hit");
            return Ok(key);
        }

        let _guard = self.refresh_lock.lock().await;

        if self.refresh_attempts.load(Ordering::Acquire) != observed_attempts {
            // Someone refreshed while we were queued
            return self.cached(kid).await.ok_or_else(|| {
                tracing::debug!(target: "catalog.auth.jwks", "Key not found after concurrent refresh");
                KeySourceError::KeyNotFound
            });
        }

        let result = self.refresh().await;
        self.refresh_attempts.fetch_add(1, Ordering::AcqRel);
        result?;

        self.cached(kid).await.ok_or_else(|| {
            tracing::warn!(target: "catalog.auth.jwks", "Key not found in JWKS after refresh");
            KeySourceError::KeyNotFound
        })
    }

    /// Drop every cached key. The next lookup refetches the key set.
    pub async fn invalidate(&self) {
        self.keys.write().await.clear();
        tracing::info!(target: "catalog.auth.jwks", "JWKS cache invalidated");
    }

    async fn cached(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Fetch the key set and swap it into the cache.
    async fn refresh(&self) -> Result<(), KeySourceError> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.fetch_timeout, self.fetch_key_set())
            .await
            .unwrap_or(Err(KeySourceError::Timeout(self.fetch_timeout)));

        let keys = match result {
            Ok(keys) => {
                metrics::record_jwks_refresh("success", start.elapsed());
                keys
            }
            Err(e) => {
                metrics::record_jwks_refresh(e.metric_status(), start.elapsed());
                tracing::error!(target: "catalog.auth.jwks", error = %e, "JWKS refresh failed");
                return Err(e);
            }
        };

        tracing::info!(
            target: "catalog.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        *self.keys.write().await = keys;
        Ok(())
    }

    async fn fetch_key_set(&self) -> Result<HashMap<String, Arc<SigningKey>>, KeySourceError> {
        let jwks_uri = self.jwks_uri().await?;

        tracing::debug!(target: "catalog.auth.jwks", url = %jwks_uri, "Fetching JWKS");
        let jwks: JwksResponse = self
            .get_json(&jwks_uri)
            .await
            .map_err(KeySourceError::Fetch)?;

        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            match SigningKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::warn!(
                        target: "catalog.auth.jwks",
                        kid = ?jwk.kid,
                        reason = %reason,
                        "Skipping unusable JWK"
                    );
                }
            }
        }

        Ok(keys)
    }

    /// JWKS URI from discovery, fetched on first use.
    async fn jwks_uri(&self) -> Result<String, KeySourceError> {
        if let Some(uri) = self.jwks_uri.read().await.as_ref() {
            return Ok(uri.clone());
        }

        let discovery_url = format!("{}{}", self.issuer_url.trim_end_matches('/'), DISCOVERY_PATH);
        tracing::info!(target: "catalog.auth.jwks", url = %discovery_url, "Fetching OIDC discovery document");

        let metadata: ProviderMetadata = self
            .get_json(&discovery_url)
            .await
            .map_err(KeySourceError::Discovery)?;

        if metadata.issuer != self.issuer_url {
            return Err(KeySourceError::Discovery(format!(
                "discovered issuer '{}' does not match configured issuer",
                metadata.issuer
            )));
        }
        if metadata.jwks_uri.is_empty() {
            return Err(KeySourceError::Discovery("missing jwks_uri".to_string()));
        }

        *self.jwks_uri.write().await = Some(metadata.jwks_uri.clone());
        Ok(metadata.jwks_uri)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, String> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("endpoint returned {}", response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))
    }
}
