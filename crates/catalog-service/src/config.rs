//! Catalog service configuration.
//!
//! Configuration is loaded once from environment variables, validated
//! eagerly, and passed explicitly into constructors.

use crate::policy::{PolicyError, PolicyMatrix, UnmatchedPolicy};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default deadline for one discovery + JWKS fetch.
pub const DEFAULT_JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for a whole HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for `JWKS_FETCH_TIMEOUT_SECONDS`.
///
/// Must stay below `REQUEST_TIMEOUT` so a stalled refresh ends as a token
/// failure rather than a request timeout.
pub const MAX_JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Catalog service configuration.
///
/// None of the fields are secrets, so the derived Debug prints everything.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// OpenID Connect issuer; tokens must carry exactly this `iss`.
    pub oidc_issuer_url: String,

    /// Accepted audiences; a token needs at least one of them in `aud`.
    pub oidc_audiences: Vec<String>,

    /// Clock skew applied to `exp`, `nbf` and `iat`.
    pub jwt_clock_skew: Duration,

    /// Deadline for one key set refresh.
    pub jwks_fetch_timeout: Duration,

    /// JSON policy document; the canonical policy when unset.
    pub policy_file: Option<PathBuf>,

    /// Decision for requests no rule matches.
    pub policy_unmatched: UnmatchedPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid OIDC configuration: {0}")]
    InvalidOidc(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksFetchTimeout(String),

    #[error("Invalid policy configuration: {0}")]
    InvalidPolicy(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let oidc_issuer_url = vars
            .get("OIDC_ISSUER_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("OIDC_ISSUER_URL".to_string()))?
            .trim()
            .to_string();
        if oidc_issuer_url.is_empty() {
            return Err(ConfigError::InvalidOidc(
                "OIDC_ISSUER_URL must not be empty".to_string(),
            ));
        }

        let oidc_audiences: Vec<String> = vars
            .get("OIDC_AUDIENCE")
            .ok_or_else(|| ConfigError::MissingEnvVar("OIDC_AUDIENCE".to_string()))?
            .split(',')
            .map(str::trim)
            .filter(|aud| !aud.is_empty())
            .map(ToString::to_string)
            .collect();
        if oidc_audiences.is_empty() {
            return Err(ConfigError::InvalidOidc(
                "OIDC_AUDIENCE must list at least one audience".to_string(),
            ));
        }

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        // Parse JWKS fetch timeout with validation
        let jwks_fetch_timeout = if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksFetchTimeout(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_JWKS_FETCH_TIMEOUT.as_secs() {
                return Err(ConfigError::InvalidJwksFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                    MAX_JWKS_FETCH_TIMEOUT.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_JWKS_FETCH_TIMEOUT
        };

        let policy_file = vars
            .get("POLICY_FILE")
            .map(|path| path.trim())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let policy_unmatched = match vars.get("POLICY_UNMATCHED") {
            Some(value) => value.parse::<UnmatchedPolicy>().map_err(|e| {
                ConfigError::InvalidPolicy(format!("POLICY_UNMATCHED: {e}"))
            })?,
            None => UnmatchedPolicy::default(),
        };

        Ok(Config {
            bind_address,
            oidc_issuer_url,
            oidc_audiences,
            jwt_clock_skew,
            jwks_fetch_timeout,
            policy_file,
            policy_unmatched,
        })
    }

    /// Build the policy matrix: the configured file, or the canonical policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if the policy file cannot be read or parsed.
    pub fn load_policy(&self) -> Result<PolicyMatrix, PolicyError> {
        match &self.policy_file {
            Some(path) => PolicyMatrix::from_file(path, self.policy_unmatched),
            None => PolicyMatrix::canonical(self.policy_unmatched),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "OIDC_ISSUER_URL".to_string(),
                "https://idp.example.com/".to_string(),
            ),
            ("OIDC_AUDIENCE".to_string(), "https://api".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.oidc_issuer_url, "https://idp.example.com/");
        assert_eq!(config.oidc_audiences, vec!["https://api".to_string()]);
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert_eq!(config.jwks_fetch_timeout, DEFAULT_JWKS_FETCH_TIMEOUT);
        assert!(config.policy_file.is_none());
        assert_eq!(config.policy_unmatched, UnmatchedPolicy::Deny);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert(
            "OIDC_AUDIENCE".to_string(),
            "https://api, https://admin-api ,".to_string(),
        );
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert("POLICY_FILE".to_string(), "/etc/catalog/policy.json".to_string());
        vars.insert("POLICY_UNMATCHED".to_string(), "allow".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.oidc_audiences,
            vec!["https://api".to_string(), "https://admin-api".to_string()]
        );
        assert_eq!(config.jwt_clock_skew, Duration::ZERO);
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(3));
        assert_eq!(
            config.policy_file,
            Some(PathBuf::from("/etc/catalog/policy.json"))
        );
        assert_eq!(config.policy_unmatched, UnmatchedPolicy::Allow);
    }

    #[test]
    fn test_from_vars_missing_issuer() {
        let mut vars = base_vars();
        vars.remove("OIDC_ISSUER_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "OIDC_ISSUER_URL"));
    }

    #[test]
    fn test_from_vars_missing_audience() {
        let mut vars = base_vars();
        vars.remove("OIDC_AUDIENCE");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "OIDC_AUDIENCE"));
    }

    #[test]
    fn test_empty_issuer_and_audience_rejected() {
        let mut vars = base_vars();
        vars.insert("OIDC_ISSUER_URL".to_string(), "  ".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidOidc(_))
        ));

        let mut vars = base_vars();
        vars.insert("OIDC_AUDIENCE".to_string(), " , ".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidOidc(msg)) if msg.contains("at least one")
        ));
    }

    #[test]
    fn test_jwt_clock_skew_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "-100".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("non-negative integer"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_bounds() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());
        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(600));

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());
        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwks_fetch_timeout_bounds() {
        let mut vars = base_vars();
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwksFetchTimeout(msg)) if msg.contains("greater than 0")
        ));

        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "20".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(20));

        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "21".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwksFetchTimeout(msg)) if msg.contains("must not exceed 20")
        ));

        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "soon".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwksFetchTimeout(_))
        ));
    }

    #[test]
    fn test_jwks_fetch_timeout_fits_inside_request_timeout() {
        assert!(MAX_JWKS_FETCH_TIMEOUT < REQUEST_TIMEOUT);
        assert!(DEFAULT_JWKS_FETCH_TIMEOUT <= MAX_JWKS_FETCH_TIMEOUT);
    }

    #[test]
    fn test_policy_unmatched_rejects_unknown_value() {
        let mut vars = base_vars();
        vars.insert("POLICY_UNMATCHED".to_string(), "maybe".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidPolicy(msg)) if msg.contains("POLICY_UNMATCHED")));
    }

    #[test]
    fn test_load_policy_defaults_to_canonical() {
        let config = Config::from_vars(&base_vars()).unwrap();

        let policy = config.load_policy().unwrap();
        assert_eq!(
            policy.rules().len(),
            PolicyMatrix::canonical(UnmatchedPolicy::Deny)
                .unwrap()
                .rules()
                .len()
        );
    }

    #[test]
    fn test_load_policy_from_file() {
        let path = std::env::temp_dir().join(format!("catalog-policy-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"rules":[{"path":"/**","require":"authenticated"}]}"#,
        )
        .unwrap();

        let mut vars = base_vars();
        vars.insert("POLICY_FILE".to_string(), path.display().to_string());
        let policy = Config::from_vars(&vars).unwrap().load_policy().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(policy.rules().len(), 1);
    }

    #[test]
    fn test_debug_prints_fields() {
        let config = Config::from_vars(&base_vars()).unwrap();
        let debug_str = format!("{:?}", config);

        assert!(debug_str.contains("https://idp.example.com/"));
        assert!(debug_str.contains("jwks_fetch_timeout"));
    }
}
