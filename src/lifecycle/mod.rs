//! Lifecycle management subsystem.
//!
//! Startup is orchestrated in `main`: config first, then core state, then
//! the listener, so traffic only arrives once the pipeline is ready.
//! Shutdown flows the other way: the signal stops the listener, in-flight
//! requests drain within a grace period, and background tasks (the session
//! sweeper) observe the broadcast and exit.

pub mod shutdown;

pub use shutdown::{shutdown_signal, Shutdown};
