//! Configuration subsystem: schema, loading, semantic validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::{
    AccessConfig, AccessRuleConfig, AppConfig, AppSettings, CorsConfig, CspConfig, CsrfConfig,
    HeaderConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig, ServerConfig,
    SessionConfig,
};
pub use validation::{validate_config, ValidationError};
