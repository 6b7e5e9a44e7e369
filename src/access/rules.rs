//! Access rule definitions and the default rule set.

use axum::http::Method;

/// Required access level for a route.
///
/// Ordering matters: when two rules tie on specificity, the more
/// restrictive (greater) level wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Public,
    Authenticated,
    Admin,
}

impl AccessLevel {
    /// Parse a configured level name. Validation has already rejected
    /// unknown values, so this only needs the three constants.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(AccessLevel::Public),
            "authenticated" => Some(AccessLevel::Authenticated),
            "admin" => Some(AccessLevel::Admin),
            _ => None,
        }
    }
}

/// A single access rule: exact path or `/*` prefix pattern, the required
/// level, and the methods it applies to (empty = all).
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub path: String,
    pub level: AccessLevel,
    pub methods: Vec<Method>,
}

impl AccessRule {
    pub fn new(path: &str, level: AccessLevel) -> Self {
        Self {
            path: path.to_string(),
            level,
            methods: Vec::new(),
        }
    }

    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    /// Whether this rule covers the method.
    pub fn applies_to_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Match the rule against a request path. Returns the specificity of
    /// the match: the literal prefix length, with exact matches outranking
    /// a prefix pattern of the same literal.
    pub fn match_specificity(&self, path: &str) -> Option<usize> {
        if let Some(prefix) = self.path.strip_suffix("/*") {
            if path == prefix || path.starts_with(prefix) && path[prefix.len()..].starts_with('/') {
                return Some(prefix.len());
            }
            None
        } else if path == self.path {
            Some(self.path.len() + 1)
        } else {
            None
        }
    }
}

/// The default rule set. Everything not listed falls back to the
/// configured default level (AUTHENTICATED out of the box).
pub fn default_rules() -> Vec<AccessRule> {
    use AccessLevel::*;

    vec![
        AccessRule::new("/", Public),
        AccessRule::new("/login", Public),
        AccessRule::new("/signup", Public),
        AccessRule::new("/reset-password", Public),
        AccessRule::new("/demo", Public),
        AccessRule::new("/health", Public),
        AccessRule::new("/metrics", Public),
        AccessRule::new("/favicon.ico", Public),
        AccessRule::new("/robots.txt", Public),
        AccessRule::new("/assets/*", Public),
        AccessRule::new("/css/*", Public),
        AccessRule::new("/js/*", Public),
        AccessRule::new("/images/*", Public),
        AccessRule::new("/fonts/*", Public),
        AccessRule::new("/static/*", Public),
        AccessRule::new("/dashboard", Authenticated),
        AccessRule::new("/logout", Authenticated),
        AccessRule::new("/profile", Authenticated),
        AccessRule::new("/settings", Authenticated),
        AccessRule::new("/forms", Authenticated),
        AccessRule::new("/forms/*", Authenticated),
        AccessRule::new("/api/v1/*", Authenticated),
        // Anonymous visitors use these from the public pages.
        AccessRule::new("/api/v1/validation/*", Public),
        AccessRule::new("/api/v1/subscriptions", Public),
        AccessRule::new("/admin", Admin),
        AccessRule::new("/admin/*", Admin),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_beats_prefix_of_same_literal() {
        let exact = AccessRule::new("/admin", AccessLevel::Admin);
        let prefix = AccessRule::new("/admin/*", AccessLevel::Admin);
        let exact_score = exact.match_specificity("/admin").unwrap();
        let prefix_score = prefix.match_specificity("/admin").unwrap();
        assert!(exact_score > prefix_score);
    }

    #[test]
    fn prefix_requires_segment_boundary() {
        let rule = AccessRule::new("/admin/*", AccessLevel::Admin);
        assert!(rule.match_specificity("/admin/users").is_some());
        assert!(rule.match_specificity("/administrator").is_none());
    }

    #[test]
    fn empty_method_set_means_all() {
        let rule = AccessRule::new("/x", AccessLevel::Public);
        assert!(rule.applies_to_method(&Method::GET));
        assert!(rule.applies_to_method(&Method::DELETE));

        let restricted = AccessRule::new("/x", AccessLevel::Public)
            .with_methods(vec![Method::GET, Method::POST]);
        assert!(restricted.applies_to_method(&Method::POST));
        assert!(!restricted.applies_to_method(&Method::PUT));
    }

    #[test]
    fn essential_defaults_are_present() {
        let rules = default_rules();
        let expect = [
            ("/", AccessLevel::Public),
            ("/login", AccessLevel::Public),
            ("/signup", AccessLevel::Public),
            ("/demo", AccessLevel::Public),
            ("/health", AccessLevel::Public),
            ("/metrics", AccessLevel::Public),
            ("/assets/*", AccessLevel::Public),
            ("/css/*", AccessLevel::Public),
            ("/js/*", AccessLevel::Public),
            ("/images/*", AccessLevel::Public),
            ("/fonts/*", AccessLevel::Public),
            ("/static/*", AccessLevel::Public),
            ("/favicon.ico", AccessLevel::Public),
            ("/robots.txt", AccessLevel::Public),
            ("/dashboard", AccessLevel::Authenticated),
            ("/forms", AccessLevel::Authenticated),
            ("/profile", AccessLevel::Authenticated),
            ("/settings", AccessLevel::Authenticated),
            ("/admin", AccessLevel::Admin),
        ];
        for (path, level) in expect {
            let rule = rules
                .iter()
                .find(|r| r.path == path)
                .unwrap_or_else(|| panic!("missing default rule for {path}"));
            assert_eq!(rule.level, level, "level mismatch for {path}");
        }
    }
}
