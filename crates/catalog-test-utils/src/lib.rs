//! # Catalog Test Utilities
//!
//! Shared test utilities for the catalog service.
//!
//! This crate provides:
//! - Deterministic Ed25519 keypairs that sign tokens and publish JWKs
//! - A claims builder (`TestTokenBuilder`)
//! - A mocked OIDC identity provider (`MockIdentityProvider`)
//! - A server harness (`TestCatalogServer`) running the real router
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalog_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let keypair = TestKeypair::new(1, "key-01");
//!     let idp = MockIdentityProvider::start().await;
//!     idp.mount_jwks(&[&keypair]).await;
//!
//!     let server = TestCatalogServer::spawn(&idp).await?;
//!     let token = keypair.sign(&server.claims().with_scope("write").build());
//!
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/cars", server.url()))
//!         .bearer_auth(token)
//!         .json(&car)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 201);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use token_builders::*;
