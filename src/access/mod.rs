//! Route access control: PUBLIC / AUTHENTICATED / ADMIN classification and
//! enforcement.

pub mod manager;
pub mod rules;

pub use manager::{enforce_access, AccessManager, Decision};
pub use rules::{default_rules, AccessLevel, AccessRule};
