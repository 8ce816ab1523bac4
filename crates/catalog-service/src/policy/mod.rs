//! Authorization policy matrix.
//!
//! An ordered list of `(path pattern, methods, requirement)` rules built once
//! at start-up. The first rule whose pattern and method both match decides;
//! when nothing matches, the configured [`UnmatchedPolicy`] applies.
//!
//! # Policy File Format
//!
//! ```json
//! {
//!   "rules": [
//!     { "path": "/swagger-ui/**", "require": "public" },
//!     { "path": "/**", "methods": ["GET"], "require": "public" },
//!     { "path": "/**", "methods": ["POST", "PUT", "DELETE"], "require": { "authority": "SCOPE_write" } },
//!     { "path": "/**", "require": "authenticated" }
//!   ]
//! }
//! ```
//!
//! An empty or missing `methods` list matches any method.

pub mod pattern;

pub use pattern::{PathPattern, PatternError};

use crate::auth::authorities::Authorities;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors building a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid path pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Invalid HTTP method '{0}'")]
    Method(String),

    #[error("Invalid policy document: {0}")]
    Document(String),

    #[error("Failed to read policy file: {0}")]
    Io(String),
}

/// What a matching rule demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Anyone, with or without a token.
    Public,
    /// Any valid token.
    Authenticated,
    /// A valid token carrying this authority.
    Authority(String),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Public => f.write_str("public"),
            Requirement::Authenticated => f.write_str("authenticated"),
            Requirement::Authority(name) => write!(f, "authority:{name}"),
        }
    }
}

/// Methods a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    Any,
    Only(Vec<Method>),
}

impl MethodMatcher {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodMatcher::Any => true,
            MethodMatcher::Only(methods) => methods.contains(method),
        }
    }
}

/// One row of the matrix.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub pattern: PathPattern,
    pub methods: MethodMatcher,
    pub requirement: Requirement,
}

impl PolicyRule {
    /// Rule restricted to `methods`; an empty slice means any method.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Pattern`] for an invalid pattern.
    pub fn new(
        pattern: &str,
        methods: &[Method],
        requirement: Requirement,
    ) -> Result<Self, PolicyError> {
        let methods = if methods.is_empty() {
            MethodMatcher::Any
        } else {
            MethodMatcher::Only(methods.to_vec())
        };
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            methods,
            requirement,
        })
    }

    /// Rule for every method.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Pattern`] for an invalid pattern.
    pub fn any_method(pattern: &str, requirement: Requirement) -> Result<Self, PolicyError> {
        Self::new(pattern, &[], requirement)
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.methods.matches(method) && self.pattern.matches(path)
    }
}

/// Behavior when no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedPolicy {
    /// Deny as unauthenticated.
    #[default]
    Deny,
    Allow,
}

impl FromStr for UnmatchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deny" => Ok(UnmatchedPolicy::Deny),
            "allow" => Ok(UnmatchedPolicy::Allow),
            other => Err(format!("expected 'deny' or 'allow', got '{other}'")),
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    InsufficientScope,
    InvalidToken,
    Expired,
}

impl DenyReason {
    /// Bounded label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::InsufficientScope => "insufficient_scope",
            DenyReason::InvalidToken => "invalid_token",
            DenyReason::Expired => "expired",
        }
    }
}

/// Outcome of authorizing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[derive(Deserialize)]
struct PolicyDocument {
    rules: Vec<RuleDocument>,
}

#[derive(Deserialize)]
struct RuleDocument {
    path: String,
    #[serde(default)]
    methods: Vec<String>,
    require: Requirement,
}

/// Ordered, immutable rule list.
#[derive(Debug, Clone)]
pub struct PolicyMatrix {
    rules: Vec<PolicyRule>,
    unmatched: UnmatchedPolicy,
}

impl PolicyMatrix {
    pub fn new(rules: Vec<PolicyRule>, unmatched: UnmatchedPolicy) -> Self {
        Self { rules, unmatched }
    }

    /// The policy the service ships with.
    ///
    /// 1. Auth, login and API documentation paths are public for any method.
    /// 2. `GET` is public everywhere.
    /// 3. `POST`, `PUT` and `DELETE` require `SCOPE_write`.
    /// 4. Anything else requires a valid token.
    ///
    /// # Errors
    ///
    /// Only fails if a built-in pattern is invalid.
    pub fn canonical(unmatched: UnmatchedPolicy) -> Result<Self, PolicyError> {
        const PUBLIC_PATHS: &[&str] = &[
            "/api/v1/auth/**",
            "/auth/**",
            "/swagger-ui/**",
            "/swagger-ui.html",
            "/swagger-resources",
            "/swagger-resources/**",
            "/webjars/**",
            "/callback",
            "/login",
            "/",
        ];

        let mut rules = PUBLIC_PATHS
            .iter()
            .map(|path| PolicyRule::any_method(path, Requirement::Public))
            .collect::<Result<Vec<_>, _>>()?;

        rules.push(PolicyRule::new("/**", &[Method::GET], Requirement::Public)?);
        rules.push(PolicyRule::new(
            "/**",
            &[Method::POST, Method::PUT, Method::DELETE],
            Requirement::Authority("SCOPE_write".to_string()),
        )?);
        rules.push(PolicyRule::any_method("/**", Requirement::Authenticated)?);

        Ok(Self::new(rules, unmatched))
    }

    /// Parse a JSON policy document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for malformed JSON, invalid patterns or
    /// unknown methods.
    pub fn from_json(json: &str, unmatched: UnmatchedPolicy) -> Result<Self, PolicyError> {
        let document: PolicyDocument =
            serde_json::from_str(json).map_err(|e| PolicyError::Document(e.to_string()))?;

        let rules = document
            .rules
            .into_iter()
            .map(|rule| {
                let methods = rule
                    .methods
                    .iter()
                    .map(|m| {
                        Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                            .map_err(|_| PolicyError::Method(m.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                PolicyRule::new(&rule.path, &methods, rule.require)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(rules, unmatched))
    }

    /// Load a JSON policy document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Io`] if the file cannot be read, otherwise as
    /// [`PolicyMatrix::from_json`].
    pub fn from_file(path: &Path, unmatched: UnmatchedPolicy) -> Result<Self, PolicyError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PolicyError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&json, unmatched)
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn unmatched(&self) -> UnmatchedPolicy {
        self.unmatched
    }

    /// Decide a request. First matching rule wins.
    pub fn decide(
        &self,
        method: &Method,
        path: &str,
        is_authenticated: bool,
        authorities: &Authorities,
    ) -> Decision {
        let Some((index, rule)) = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(method, path))
        else {
            tracing::debug!(
                target: "catalog.policy",
                method = %method,
                path = %path,
                unmatched = ?self.unmatched,
                "No policy rule matched"
            );
            return match self.unmatched {
                UnmatchedPolicy::Allow => Decision::Allow,
                UnmatchedPolicy::Deny => Decision::Deny(DenyReason::Unauthenticated),
            };
        };

        let decision = match &rule.requirement {
            Requirement::Public => Decision::Allow,
            Requirement::Authenticated if is_authenticated => Decision::Allow,
            Requirement::Authenticated => Decision::Deny(DenyReason::Unauthenticated),
            Requirement::Authority(name) if authorities.contains(name) => Decision::Allow,
            Requirement::Authority(_) if is_authenticated => {
                Decision::Deny(DenyReason::InsufficientScope)
            }
            Requirement::Authority(_) => Decision::Deny(DenyReason::Unauthenticated),
        };

        tracing::debug!(
            target: "catalog.policy",
            method = %method,
            path = %path,
            rule = index,
            pattern = %rule.pattern,
            requirement = %rule.requirement,
            decision = ?decision,
            "Policy rule matched"
        );

        decision
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn write_scope() -> Authorities {
        ["SCOPE_write"].into_iter().collect()
    }

    fn canonical() -> PolicyMatrix {
        PolicyMatrix::canonical(UnmatchedPolicy::Deny).unwrap()
    }

    #[test]
    fn test_canonical_get_is_public() {
        let policy = canonical();

        assert_eq!(
            policy.decide(&Method::GET, "/cars", false, &Authorities::empty()),
            Decision::Allow
        );
        assert_eq!(
            policy.decide(&Method::GET, "/cars/makes/audi", false, &Authorities::empty()),
            Decision::Allow
        );
    }

    #[test]
    fn test_canonical_write_requires_scope() {
        let policy = canonical();

        assert_eq!(
            policy.decide(&Method::POST, "/cars", false, &Authorities::empty()),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            policy.decide(&Method::POST, "/cars", true, &Authorities::empty()),
            Decision::Deny(DenyReason::InsufficientScope)
        );
        assert_eq!(
            policy.decide(&Method::DELETE, "/cars/abc", true, &write_scope()),
            Decision::Allow
        );
    }

    #[test]
    fn test_canonical_public_paths_allow_any_method() {
        let policy = canonical();

        for path in [
            "/swagger-ui/index.html",
            "/swagger-ui.html",
            "/swagger-resources",
            "/webjars/jquery.js",
            "/api/v1/auth/token",
            "/auth/callback",
            "/callback",
            "/login",
            "/",
        ] {
            assert_eq!(
                policy.decide(&Method::POST, path, false, &Authorities::empty()),
                Decision::Allow,
                "POST {path} should be public"
            );
        }
    }

    #[test]
    fn test_canonical_other_methods_require_authentication() {
        let policy = canonical();

        assert_eq!(
            policy.decide(&Method::PATCH, "/cars/abc", false, &Authorities::empty()),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            policy.decide(&Method::PATCH, "/cars/abc", true, &Authorities::empty()),
            Decision::Allow
        );
    }

    #[test]
    fn test_canonical_is_inspectable() {
        let policy = canonical();

        assert_eq!(policy.rules().len(), 13);
        assert_eq!(policy.unmatched(), UnmatchedPolicy::Deny);
        let last = policy.rules().last().unwrap();
        assert_eq!(last.pattern.as_str(), "/**");
        assert_eq!(last.methods, MethodMatcher::Any);
        assert_eq!(last.requirement, Requirement::Authenticated);
    }

    #[test]
    fn test_first_match_wins() {
        let open_first = PolicyMatrix::new(
            vec![
                PolicyRule::any_method("/cars/**", Requirement::Public).unwrap(),
                PolicyRule::any_method("/cars/**", Requirement::Authenticated).unwrap(),
            ],
            UnmatchedPolicy::Deny,
        );
        let closed_first = PolicyMatrix::new(
            open_first.rules().iter().rev().cloned().collect(),
            UnmatchedPolicy::Deny,
        );

        assert_eq!(
            open_first.decide(&Method::POST, "/cars/1", false, &Authorities::empty()),
            Decision::Allow
        );
        assert_eq!(
            closed_first.decide(&Method::POST, "/cars/1", false, &Authorities::empty()),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn test_unmatched_default() {
        let rules = vec![PolicyRule::new("/cars", &[Method::GET], Requirement::Public).unwrap()];

        let deny = PolicyMatrix::new(rules.clone(), UnmatchedPolicy::Deny);
        let allow = PolicyMatrix::new(rules, UnmatchedPolicy::Allow);

        assert_eq!(
            deny.decide(&Method::GET, "/trucks", true, &write_scope()),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            allow.decide(&Method::GET, "/trucks", false, &Authorities::empty()),
            Decision::Allow
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "rules": [
                { "path": "/health", "require": "public" },
                { "path": "/cars/**", "methods": ["get"], "require": "authenticated" },
                { "path": "/cars/**", "methods": ["POST"], "require": { "authority": "SCOPE_admin" } }
            ]
        }"#;

        let policy = PolicyMatrix::from_json(json, UnmatchedPolicy::Deny).unwrap();

        assert_eq!(policy.rules().len(), 3);
        assert_eq!(
            policy.rules().get(1).unwrap().methods,
            MethodMatcher::Only(vec![Method::GET])
        );
        assert_eq!(
            policy.decide(&Method::POST, "/cars", true, &write_scope()),
            Decision::Deny(DenyReason::InsufficientScope)
        );
        assert_eq!(
            policy.decide(&Method::GET, "/cars", false, &Authorities::empty()),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            PolicyMatrix::from_json(r#"{"rules":[{"path":"/**/x","require":"public"}]}"#, UnmatchedPolicy::Deny),
            Err(PolicyError::Pattern(_))
        ));
        assert!(matches!(
            PolicyMatrix::from_json(
                r#"{"rules":[{"path":"/x","methods":["GE T"],"require":"public"}]}"#,
                UnmatchedPolicy::Deny
            ),
            Err(PolicyError::Method(_))
        ));
        assert!(matches!(
            PolicyMatrix::from_json(r#"{"rules":[{"path":"/x","require":"everyone"}]}"#, UnmatchedPolicy::Deny),
            Err(PolicyError::Document(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let result = PolicyMatrix::from_file(
            Path::new("/nonexistent/policy.json"),
            UnmatchedPolicy::Deny,
        );
        assert!(matches!(result, Err(PolicyError::Io(_))));
    }

    #[test]
    fn test_unmatched_policy_from_str() {
        assert_eq!("deny".parse::<UnmatchedPolicy>(), Ok(UnmatchedPolicy::Deny));
        assert_eq!(" Allow ".parse::<UnmatchedPolicy>(), Ok(UnmatchedPolicy::Allow));
        assert!("maybe".parse::<UnmatchedPolicy>().is_err());
    }

    #[test]
    fn test_decisions_are_idempotent() {
        let policy = canonical();
        let first = policy.decide(&Method::PUT, "/cars/1", true, &Authorities::empty());
        let second = policy.decide(&Method::PUT, "/cars/1", true, &Authorities::empty());
        assert_eq!(first, second);
    }
}
