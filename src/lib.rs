//! Form collection service.
//!
//! Accepts form submissions from third-party sites, manages the accounts
//! that own those forms, and puts every request through a fixed middleware
//! pipeline: recovery, request context, logging, CORS, security headers,
//! CSRF, rate limiting, session resolution and access control, in that
//! order for every route.

pub mod access;
pub mod config;
pub mod errors;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod services;
pub mod session;

pub use config::AppConfig;
pub use errors::AppError;
pub use http::{build_router, AppState};
pub use lifecycle::Shutdown;
