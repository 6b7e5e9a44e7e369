//! Request handlers. Thin by design: the pipeline has already decided
//! identity, admission and protection by the time these run, so handlers
//! only translate between HTTP and the domain services.

pub mod api;
pub mod auth;
pub mod forms;
pub mod pages;
