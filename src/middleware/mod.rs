//! The request-processing pipeline.
//!
//! Middleware execute in a fixed order, identical for every request; the
//! chain is assembled once in `http::server::build_router` and never
//! mutated afterwards:
//!
//! 1. recovery      — panics become structured responses
//! 2. context       — deadline, request id, request-scoped span
//! 3. logging       — one INFO line per request on exit
//! 4. cors          — per-form CORS on submission routes, global elsewhere
//! 5. headers       — CSP and the fixed security headers
//! 6. csrf          — token issuance and validation
//! 7. rate_limit    — token bucket per identifier
//! 8. (session)     — resolver lives in `crate::session`
//! 9. (access)      — enforcement lives in `crate::access`

pub mod context;
pub mod cors;
pub mod csrf;
pub mod headers;
pub mod logging;
pub mod rate_limit;
pub mod recovery;
