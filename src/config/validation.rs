//! Semantic configuration validation.
//!
//! Serde handles syntactic validation; this pass checks value ranges and
//! cross-field consistency. All errors are collected and reported together
//! rather than failing on the first, so an operator can fix a bad file in
//! one pass.

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::AppConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending setting, e.g. `rate_limit.requests`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const KNOWN_ENVS: &[&str] = &["development", "staging", "production"];
const KNOWN_LEVELS: &[&str] = &["public", "authenticated", "admin"];
const KNOWN_SAME_SITE: &[&str] = &["", "Lax", "Strict", "None"];

/// Validate a parsed configuration, returning every violation found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !KNOWN_ENVS.contains(&config.app.env.as_str()) {
        errors.push(ValidationError::new(
            "app.env",
            format!(
                "unknown environment {:?}, expected one of {KNOWN_ENVS:?}",
                config.app.env
            ),
        ));
    }
    if config.app.scheme != "http" && config.app.scheme != "https" {
        errors.push(ValidationError::new(
            "app.scheme",
            format!("unknown scheme {:?}", config.app.scheme),
        ));
    }
    if config.app.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "app.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::new(
            "session.cookie_name",
            "must not be empty",
        ));
    }
    if config.session.max_age_secs == 0 {
        errors.push(ValidationError::new(
            "session.max_age_secs",
            "must be greater than zero",
        ));
    }
    if !KNOWN_SAME_SITE.contains(&config.session.same_site.as_str()) {
        errors.push(ValidationError::new(
            "session.same_site",
            format!("unknown SameSite value {:?}", config.session.same_site),
        ));
    }

    if config.csrf.enabled {
        if config.csrf.cookie_name.is_empty() {
            errors.push(ValidationError::new(
                "csrf.cookie_name",
                "must not be empty",
            ));
        }
        if crate::middleware::csrf::parse_token_lookup(&config.csrf.token_lookup).is_empty() {
            errors.push(ValidationError::new(
                "csrf.token_lookup",
                format!(
                    "no valid sources in {:?}, expected `header:<name>` or `form:<field>` entries",
                    config.csrf.token_lookup
                ),
            ));
        }
        if !KNOWN_SAME_SITE.contains(&config.csrf.cookie_same_site.as_str()) {
            errors.push(ValidationError::new(
                "csrf.cookie_same_site",
                format!("unknown SameSite value {:?}", config.csrf.cookie_same_site),
            ));
        }
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests == 0 {
            errors.push(ValidationError::new(
                "rate_limit.requests",
                "must be greater than zero",
            ));
        }
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new(
                "rate_limit.window_secs",
                "must be greater than zero",
            ));
        }
        if config.rate_limit.burst == 0 {
            errors.push(ValidationError::new(
                "rate_limit.burst",
                "must be greater than zero",
            ));
        }
    }

    // Wildcard origins and credentialed requests are mutually exclusive.
    if config.cors.allow_credentials
        && config.cors.allowed_origins.iter().any(|o| o == "*")
    {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "wildcard origin is forbidden when allow_credentials is set",
        ));
    }

    if !KNOWN_LEVELS.contains(&config.access.default_level.as_str()) {
        errors.push(ValidationError::new(
            "access.default_level",
            format!(
                "unknown level {:?}, expected one of {KNOWN_LEVELS:?}",
                config.access.default_level
            ),
        ));
    }
    let mut seen_exact = HashSet::new();
    for (i, rule) in config.access.rules.iter().enumerate() {
        let field = format!("access.rules[{i}]");
        if rule.path.is_empty() {
            errors.push(ValidationError::new(&field, "path must not be empty"));
        }
        if !KNOWN_LEVELS.contains(&rule.level.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("unknown level {:?}", rule.level),
            ));
        }
        if !rule.path.ends_with("/*") && !seen_exact.insert(rule.path.clone()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate exact-path rule for {:?}", rule.path),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AccessRuleConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = AppConfig::default();
        config.app.env = "prod".to_string();
        config.app.request_timeout_secs = 0;
        config.rate_limit.burst = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "app.env"));
        assert!(errors.iter().any(|e| e.field == "rate_limit.burst"));
    }

    #[test]
    fn rejects_wildcard_origin_with_credentials() {
        let mut config = AppConfig::default();
        config.cors.allowed_origins = vec!["*".to_string()];
        config.cors.allow_credentials = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "cors.allowed_origins");
    }

    #[test]
    fn rejects_duplicate_exact_rules() {
        let mut config = AppConfig::default();
        config.access.rules = vec![
            AccessRuleConfig {
                path: "/reports".to_string(),
                level: "admin".to_string(),
                methods: vec![],
            },
            AccessRuleConfig {
                path: "/reports".to_string(),
                level: "public".to_string(),
                methods: vec![],
            },
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("duplicate"));
    }

    #[test]
    fn rejects_invalid_default_level() {
        let mut config = AppConfig::default();
        config.access.default_level = "superuser".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn prefix_rules_may_repeat_paths() {
        let mut config = AppConfig::default();
        config.access.rules = vec![
            AccessRuleConfig {
                path: "/reports/*".to_string(),
                level: "admin".to_string(),
                methods: vec!["GET".to_string()],
            },
            AccessRuleConfig {
                path: "/reports/*".to_string(),
                level: "admin".to_string(),
                methods: vec!["POST".to_string()],
            },
        ];
        assert!(validate_config(&config).is_ok());
    }
}
