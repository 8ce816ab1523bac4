//! Authority mapping from validated claims.

use crate::auth::claims::{Claims, ScopeList};
use std::collections::BTreeSet;

/// Prefix applied to every scope to form an authority name.
pub const SCOPE_PREFIX: &str = "SCOPE_";

/// Sorted set of granted authorities, e.g. `SCOPE_write`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorities(BTreeSet<String>);

impl Authorities {
    /// No authorities; what an unauthenticated request carries.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, authority: &str) -> bool {
        self.0.contains(authority)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Authorities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Derive authorities from claims.
///
/// `scope` wins when present; otherwise `scp` is used. Each scope `s`
/// becomes `SCOPE_s`. Empty entries are ignored.
pub fn map_authorities(claims: &Claims) -> Authorities {
    let scopes: Vec<&str> = match (&claims.scope, &claims.scp) {
        (Some(scope), _) => scope.split_whitespace().collect(),
        (None, Some(ScopeList::Delimited(scp))) => scp.split_whitespace().collect(),
        (None, Some(ScopeList::List(scp))) => scp
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect(),
        (None, None) => Vec::new(),
    };

    scopes
        .into_iter()
        .map(|scope| format!("{SCOPE_PREFIX}{scope}"))
        .collect()
}
