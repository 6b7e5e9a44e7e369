//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline middleware produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges, Prometheus exposition)
//!
//! Consumers:
//!     → stdout (pretty in development, JSON elsewhere)
//!     → GET /metrics (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
