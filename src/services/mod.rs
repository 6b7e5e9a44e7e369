//! Domain service seams.
//!
//! The pipeline treats user accounts, forms and subscriptions as external
//! collaborators; only the service-level signatures matter here. The
//! in-memory implementations in [`memory`] back the default wiring and the
//! test suite. A SQL-backed deployment swaps them behind the same traits.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::session::Role;

pub use memory::{MemoryFormStore, MemorySubscriptionStore, MemoryUserStore};

/// An account that owns forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// CORS policy attached to a single form by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormCorsPolicy {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allow_credentials: bool,
}

impl FormCorsPolicy {
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}

/// What the forms API returns per form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: String,
    pub submission_count: usize,
}

/// Account management.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Register a new account. Fails with `Conflict` when the email is taken.
    async fn signup(&self, email: &str, name: &str, password: &str) -> Result<User, AppError>;

    /// Verify credentials. Fails with `Authentication` on any mismatch.
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError>;
}

/// Form definitions and submission intake.
#[async_trait]
pub trait FormService: Send + Sync {
    /// The form owner's CORS policy, or `None` when the form is unknown.
    async fn cors_policy(&self, form_id: &str) -> Result<Option<FormCorsPolicy>, AppError>;

    /// Store a submission. Fails with `NotFound` for unknown forms.
    async fn submit(&self, form_id: &str, payload: serde_json::Value) -> Result<(), AppError>;

    /// Summaries of every known form.
    async fn list_forms(&self) -> Result<Vec<FormSummary>, AppError>;
}

/// Newsletter subscription lifecycle.
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Subscribe an email address. Fails with `Conflict` when already
    /// subscribed, `Validation` when the address is malformed.
    async fn subscribe(&self, email: &str) -> Result<(), AppError>;
}
