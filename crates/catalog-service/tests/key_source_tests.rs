//! Key source integration tests.
//!
//! Exercises discovery, JWKS caching, single-flight refresh and failure
//! handling against a mocked identity provider.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use catalog_service::auth::jwks::KeySourceError;
use catalog_service::auth::KeySource;
use catalog_test_utils::{MockIdentityProvider, TestKeypair};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

fn key_source(idp: &MockIdentityProvider, timeout: Duration) -> Arc<KeySource> {
    Arc::new(KeySource::new(idp.issuer(), timeout))
}

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    let idp = MockIdentityProvider::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks_expecting(&[&keypair], 1, Duration::from_millis(300))
        .await;
    let keys = key_source(&idp, Duration::from_secs(5));

    let lookups = (0..16).map(|_| {
        let keys = Arc::clone(&keys);
        async move { keys.resolve_key("key-01").await }
    });
    let results = join_all(lookups).await;

    assert!(results.iter().all(Result::is_ok));
    idp.verify().await;
}

#[tokio::test]
async fn test_cached_key_is_served_without_refetch() {
    let idp = MockIdentityProvider::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks(&[&keypair]).await;
    let keys = key_source(&idp, Duration::from_secs(5));

    keys.resolve_key("key-01").await.unwrap();
    keys.resolve_key("key-01").await.unwrap();

    assert_eq!(idp.jwks_requests().await, 1);
}

#[tokio::test]
async fn test_unknown_kid_refetches_each_miss() {
    let idp = MockIdentityProvider::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks(&[&keypair]).await;
    let keys = key_source(&idp, Duration::from_secs(5));

    let first = keys.resolve_key("key-missing").await;
    let second = keys.resolve_key("key-missing").await;

    assert!(matches!(first, Err(KeySourceError::KeyNotFound)));
    assert!(matches!(second, Err(KeySourceError::KeyNotFound)));
    assert_eq!(idp.jwks_requests().await, 2);
}

#[tokio::test]
async fn test_rotated_key_is_picked_up() {
    let idp = MockIdentityProvider::start().await;
    let old_key = TestKeypair::new(1, "key-01");
    let new_key = TestKeypair::new(2, "key-02");
    idp.mount_jwks(&[&old_key]).await;
    let keys = key_source(&idp, Duration::from_secs(5));

    keys.resolve_key("key-01").await.unwrap();

    idp.reset().await;
    idp.mount_jwks(&[&old_key, &new_key]).await;

    let rotated = keys.resolve_key("key-02").await.unwrap();
    assert_eq!(rotated.kid, "key-02");
    // The refreshed set still carries the old key
    keys.resolve_key("key-01").await.unwrap();
}

#[tokio::test]
async fn test_failed_fetch_is_retried_on_next_use() {
    let idp = MockIdentityProvider::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks_failure(503, 1).await;
    idp.mount_jwks(&[&keypair]).await;
    let keys = key_source(&idp, Duration::from_secs(5));

    let first = keys.resolve_key("key-01").await;
    assert!(matches!(first, Err(KeySourceError::Fetch(_))));

    keys.resolve_key("key-01").await.unwrap();
    assert_eq!(idp.jwks_requests().await, 2);
}

#[tokio::test]
async fn test_slow_jwks_times_out() {
    let idp = MockIdentityProvider::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks_delayed(&[&keypair], Duration::from_secs(3))
        .await;
    let keys = key_source(&idp, Duration::from_millis(300));

    let result = keys.resolve_key("key-01").await;

    assert!(matches!(
        result,
        Err(KeySourceError::Timeout(_) | KeySourceError::Fetch(_))
    ));
}

#[tokio::test]
async fn test_discovered_issuer_must_match() {
    let idp = MockIdentityProvider::start_with_discovered_issuer("https://other.example.com/").await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks(&[&keypair]).await;
    let keys = key_source(&idp, Duration::from_secs(5));

    let result = keys.resolve_key("key-01").await;

    assert!(matches!(result, Err(KeySourceError::Discovery(_))));
    assert_eq!(idp.jwks_requests().await, 0);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let idp = MockIdentityProvider::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    idp.mount_jwks(&[&keypair]).await;
    let keys = key_source(&idp, Duration::from_secs(5));

    keys.resolve_key("key-01").await.unwrap();
    keys.invalidate().await;
    keys.resolve_key("key-01").await.unwrap();

    assert_eq!(idp.jwks_requests().await, 2);
}
