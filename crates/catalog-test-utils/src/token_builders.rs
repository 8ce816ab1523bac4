//! Builder patterns for test data construction
//!
//! Provides a fluent API for test token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for test JWT claims
///
/// Defaults: subject `user-1`, issued now, expiring in one hour, no scope.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new("https://idp.example.com/", "catalog-api")
///     .for_subject("alice")
///     .with_scope("read write")
///     .expires_in(300)
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    iss: String,
    aud: Vec<String>,
    exp: i64,
    iat: i64,
    nbf: Option<i64>,
    scope: Option<String>,
    scp: Option<Vec<String>>,
}

impl TestTokenBuilder {
    /// Create a builder for tokens from `issuer` to `audience`.
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: Some("user-1".to_string()),
            iss: issuer.to_string(),
            aud: vec![audience.to_string()],
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            scope: None,
            scp: None,
        }
    }

    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Omit the `sub` claim entirely.
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Replace the audience. More than one is encoded as an array.
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = audiences.iter().map(ToString::to_string).collect();
        self
    }

    /// Set the space-delimited `scope` claim.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Set the `scp` list claim.
    pub fn with_scp(mut self, scopes: &[&str]) -> Self {
        self.scp = Some(scopes.iter().map(ToString::to_string).collect());
        self
    }

    /// Set expiration in seconds from now (negative for the past).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set not-before in seconds from now.
    pub fn not_before(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set issued-at in seconds from now.
    pub fn issued_at(mut self, seconds: i64) -> Self {
        self.iat = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let aud = match self.aud.as_slice() {
            [single] => json!(single),
            many => json!(many),
        };

        let mut claims = Map::new();
        if let Some(sub) = self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        claims.insert("iss".to_string(), json!(self.iss));
        claims.insert("aud".to_string(), aud);
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(scope) = self.scope {
            claims.insert("scope".to_string(), json!(scope));
        }
        if let Some(scp) = self.scp {
            claims.insert("scp".to_string(), json!(scp));
        }
        Value::Object(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let claims = TestTokenBuilder::new("https://idp/", "catalog-api").build();

        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["iss"], "https://idp/");
        assert_eq!(claims["aud"], "catalog-api");
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
        assert!(claims.get("scope").is_none());
        assert!(claims.get("nbf").is_none());
    }

    #[test]
    fn test_builder_multiple_audiences() {
        let claims = TestTokenBuilder::new("https://idp/", "a")
            .with_audiences(&["a", "b"])
            .with_scp(&["read"])
            .build();

        assert_eq!(claims["aud"], json!(["a", "b"]));
        assert_eq!(claims["scp"], json!(["read"]));
    }

    #[test]
    fn test_builder_without_subject() {
        let claims = TestTokenBuilder::new("https://idp/", "a")
            .without_subject()
            .build();

        assert!(claims.get("sub").is_none());
    }
}
