//! Route matching logic.
//!
//! # Responsibilities
//! - Match request paths against exact or wildcard patterns
//! - Match request methods against a route's method set
//! - Expose the specificity figures the router sorts by
//!
//! # Design Decisions
//! - Path matching is ASCII case-insensitive
//! - A trailing `*` turns a path into a prefix; it is the only wildcard
//! - No regex to guarantee O(n) matching

use std::fmt;

use axum::http::Method;

/// A route path, compiled from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches one path only.
    Exact(String),
    /// Matches every path starting with the literal.
    Prefix(String),
}

impl PathPattern {
    /// Compile a configured path. Trailing `*` markers make it a prefix.
    pub fn parse(path: &str) -> Self {
        let path = path.trim();
        if path.ends_with('*') {
            PathPattern::Prefix(path.trim_end_matches('*').to_string())
        } else {
            PathPattern::Exact(path.to_string())
        }
    }

    pub fn literal(&self) -> &str {
        match self {
            PathPattern::Exact(p) | PathPattern::Prefix(p) => p,
        }
    }

    /// Length of the literal part, the primary specificity key.
    pub fn literal_len(&self) -> usize {
        self.literal().len()
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, PathPattern::Prefix(_))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(literal) => literal.eq_ignore_ascii_case(path),
            PathPattern::Prefix(literal) => path
                .get(..literal.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(literal)),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => f.write_str(p),
            PathPattern::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

/// The methods a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    Any,
    /// Upper-cased, deduplicated method names.
    Only(Vec<String>),
}

impl MethodSet {
    /// Build from configured names. Empty input or a `*` entry means any method.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut methods: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if name == "*" {
                return MethodSet::Any;
            }
            let upper = name.to_ascii_uppercase();
            if !methods.contains(&upper) {
                methods.push(upper);
            }
        }

        if methods.is_empty() {
            MethodSet::Any
        } else {
            MethodSet::Only(methods)
        }
    }

    /// Number of methods accepted; `Any` counts as the widest possible set.
    pub fn width(&self) -> usize {
        match self {
            MethodSet::Any => usize::MAX,
            MethodSet::Only(methods) => methods.len(),
        }
    }

    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method.as_str())),
        }
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodSet::Any => f.write_str("*"),
            MethodSet::Only(methods) => f.write_str(&methods.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_path() {
        let pattern = PathPattern::parse("/api/users");
        assert!(!pattern.is_wildcard());
        assert!(pattern.matches("/api/users"));
        assert!(pattern.matches("/API/Users"));
        assert!(!pattern.matches("/api/users/1"));
        assert!(!pattern.matches("/api"));
    }

    #[test]
    fn test_prefix_path() {
        let pattern = PathPattern::parse("/api/*");
        assert!(pattern.is_wildcard());
        assert_eq!(pattern.literal(), "/api/");
        assert_eq!(pattern.literal_len(), 5);
        assert!(pattern.matches("/api/orders"));
        assert!(pattern.matches("/API/"));
        assert!(!pattern.matches("/api"));
        assert!(!pattern.matches("/images/a.png"));
    }

    #[test]
    fn test_root_is_exact() {
        let pattern = PathPattern::parse("/");
        assert!(pattern.matches("/"));
        assert!(!pattern.matches("/index.html"));

        let catch_all = PathPattern::parse("/*");
        assert!(catch_all.matches("/index.html"));
    }

    #[test]
    fn test_non_ascii_path_does_not_panic() {
        let pattern = PathPattern::parse("/ab*");
        // Slicing at byte 3 would split the multi-byte character.
        assert!(!pattern.matches("/aé"));
    }

    #[test]
    fn test_method_set() {
        let set = MethodSet::from_names(["get", "POST", "GET"]);
        assert_eq!(set, MethodSet::Only(vec!["GET".into(), "POST".into()]));
        assert_eq!(set.width(), 2);
        assert!(set.matches(&Method::GET));
        assert!(!set.matches(&Method::DELETE));

        let any = MethodSet::from_names(Vec::<String>::new());
        assert_eq!(any, MethodSet::Any);
        assert!(any.matches(&Method::PATCH));

        let star = MethodSet::from_names(["GET", "*"]);
        assert_eq!(star, MethodSet::Any);
        assert!(star.width() > set.width());
    }
}
