//! Path patterns for policy rules.
//!
//! Grammar: a pattern starts with `/` and is split on `/` into segments.
//! A segment is a literal, `*` (exactly one path segment), or `**`
//! (zero or more segments, only allowed as the last segment).

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern '{0}' must start with '/'")]
    NotAbsolute(String),

    #[error("pattern '{0}' uses '**' before the last segment")]
    InnerDoubleWildcard(String),

    #[error("pattern '{0}' mixes '*' with literal text in one segment")]
    PartialWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
}

/// A compiled path pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    /// Pattern ends in `**`.
    open_ended: bool,
}

impl PathPattern {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern is not absolute, uses `**`
    /// anywhere but last, or embeds `*` inside a literal segment.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        let raw_segments = split_path(pattern);
        let last = raw_segments.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(raw_segments.len());
        let mut open_ended = false;

        for (index, segment) in raw_segments.into_iter().enumerate() {
            match segment {
                "**" if index == last => open_ended = true,
                "**" => return Err(PatternError::InnerDoubleWildcard(pattern.to_string())),
                "*" => segments.push(Segment::Single),
                literal if literal.contains('*') => {
                    return Err(PatternError::PartialWildcard(pattern.to_string()))
                }
                literal => segments.push(Segment::Literal(literal.to_string())),
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            open_ended,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Does `path` match this pattern?
    pub fn matches(&self, path: &str) -> bool {
        let path_segments = split_path(path);

        let length_ok = if self.open_ended {
            path_segments.len() >= self.segments.len()
        } else {
            path_segments.len() == self.segments.len()
        };
        if !length_ok {
            return false;
        }

        self.segments
            .iter()
            .zip(path_segments)
            .all(|(pattern, actual)| match pattern {
                Segment::Single => true,
                Segment::Literal(literal) => literal == actual,
            })
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathPattern({})", self.raw)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `/` and the empty path have no segments; `/a/b` has `["a", "b"]`.
fn split_path(path: &str) -> Vec<&str> {
    match path.strip_prefix('/').unwrap_or(path) {
        "" => Vec::new(),
        rest => rest.split('/').collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PathPattern::parse(pattern).unwrap().matches(path)
    }

    #[test]
    fn test_literal_patterns() {
        assert!(matches("/login", "/login"));
        assert!(!matches("/login", "/login/extra"));
        assert!(!matches("/login", "/logout"));
        assert!(matches("/", "/"));
        assert!(!matches("/", "/cars"));
    }

    #[test]
    fn test_single_wildcard_matches_one_segment() {
        assert!(matches("/cars/*", "/cars/abc"));
        assert!(!matches("/cars/*", "/cars"));
        assert!(!matches("/cars/*", "/cars/abc/def"));
        assert!(matches("/cars/makes/*/models/*", "/cars/makes/audi/models/a4"));
    }

    #[test]
    fn test_trailing_double_wildcard() {
        assert!(matches("/docs/**", "/docs"));
        assert!(matches("/docs/**", "/docs/a"));
        assert!(matches("/docs/**", "/docs/a/b"));
        assert!(!matches("/docs/**", "/documents"));
        assert!(matches("/**", "/"));
        assert!(matches("/**", "/anything/at/all"));
    }

    #[test]
    fn test_swagger_patterns() {
        assert!(matches("/swagger-ui/**", "/swagger-ui/index.html"));
        assert!(matches("/swagger-ui.html", "/swagger-ui.html"));
        assert!(!matches("/swagger-resources", "/swagger-resources/configuration"));
        assert!(matches("/swagger-resources/**", "/swagger-resources/configuration"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert_eq!(
            PathPattern::parse("cars/**"),
            Err(PatternError::NotAbsolute("cars/**".to_string()))
        );
        assert_eq!(
            PathPattern::parse("/**/cars"),
            Err(PatternError::InnerDoubleWildcard("/**/cars".to_string()))
        );
        assert_eq!(
            PathPattern::parse("/cars/ab*"),
            Err(PatternError::PartialWildcard("/cars/ab*".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips_raw_pattern() {
        let pattern = PathPattern::parse("/api/v1/auth/**").unwrap();
        assert_eq!(pattern.to_string(), "/api/v1/auth/**");
        assert_eq!(pattern.as_str(), "/api/v1/auth/**");
    }
}
