//! Structured logging initialization.
//!
//! Pretty, human-oriented output in development; JSON lines in staging and
//! production. The level comes from `observability.log_level` unless
//! `RUST_LOG` is set, which always wins.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before any request is served.
pub fn init(env: &str, log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("formgate={log_level},tower_http=info")));

    if env == "development" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}
