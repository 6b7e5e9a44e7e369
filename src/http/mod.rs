//! HTTP surface: router assembly, application state and handlers.

pub mod handlers;
pub mod request;
pub mod server;

pub use server::{build_router, AppState};
