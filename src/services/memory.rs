//! In-memory service implementations.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::{
    FormCorsPolicy, FormService, FormSummary, SubscriptionService, User, UserService,
};
use crate::session::Role;

struct UserRecord {
    user: User,
    // Stored as received; hashing is the deployment's concern, not the
    // pipeline's.
    password: String,
}

/// In-memory user store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account, used by the development wiring and tests.
    pub fn with_user(self, email: &str, name: &str, password: &str, role: Role) -> Self {
        {
            let mut users = self.users.write().expect("user store lock poisoned");
            users.insert(
                email.to_string(),
                UserRecord {
                    user: User {
                        id: Uuid::new_v4().to_string(),
                        email: email.to_string(),
                        name: name.to_string(),
                        role,
                    },
                    password: password.to_string(),
                },
            );
        }
        self
    }
}

#[async_trait]
impl UserService for MemoryUserStore {
    async fn signup(&self, email: &str, name: &str, password: &str) -> Result<User, AppError> {
        if !email.contains('@') {
            return Err(AppError::Validation("invalid email address".to_string()));
        }
        if password.len() < 8 {
            return Err(AppError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let mut users = self.users.write().expect("user store lock poisoned");
        if users.contains_key(email) {
            return Err(AppError::Conflict("email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: Role::User,
        };
        users.insert(
            email.to_string(),
            UserRecord {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        Ok(user)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let users = self.users.read().expect("user store lock poisoned");
        match users.get(email) {
            Some(record) if record.password == password => Ok(record.user.clone()),
            _ => Err(AppError::Authentication("Invalid credentials".to_string())),
        }
    }
}

struct FormRecord {
    cors: Option<FormCorsPolicy>,
    submissions: Vec<serde_json::Value>,
}

/// In-memory form store.
#[derive(Default)]
pub struct MemoryFormStore {
    forms: RwLock<HashMap<String, FormRecord>>,
}

impl MemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a form with an optional CORS policy.
    pub fn with_form(self, form_id: &str, cors: Option<FormCorsPolicy>) -> Self {
        {
            let mut forms = self.forms.write().expect("form store lock poisoned");
            forms.insert(
                form_id.to_string(),
                FormRecord {
                    cors,
                    submissions: Vec::new(),
                },
            );
        }
        self
    }

    pub fn submission_count(&self, form_id: &str) -> usize {
        self.forms
            .read()
            .expect("form store lock poisoned")
            .get(form_id)
            .map(|f| f.submissions.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl FormService for MemoryFormStore {
    async fn cors_policy(&self, form_id: &str) -> Result<Option<FormCorsPolicy>, AppError> {
        let forms = self.forms.read().expect("form store lock poisoned");
        match forms.get(form_id) {
            Some(record) => Ok(Some(record.cors.clone().unwrap_or(FormCorsPolicy {
                allowed_origins: Vec::new(),
                allowed_methods: vec!["POST".to_string()],
                allow_credentials: false,
            }))),
            None => Ok(None),
        }
    }

    async fn submit(&self, form_id: &str, payload: serde_json::Value) -> Result<(), AppError> {
        let mut forms = self.forms.write().expect("form store lock poisoned");
        match forms.get_mut(form_id) {
            Some(record) => {
                record.submissions.push(payload);
                Ok(())
            }
            None => Err(AppError::NotFound("form not found".to_string())),
        }
    }

    async fn list_forms(&self) -> Result<Vec<FormSummary>, AppError> {
        let forms = self.forms.read().expect("form store lock poisoned");
        let mut summaries: Vec<FormSummary> = forms
            .iter()
            .map(|(id, record)| FormSummary {
                id: id.clone(),
                submission_count: record.submissions.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

/// In-memory subscription store.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    emails: RwLock<HashSet<String>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionService for MemorySubscriptionStore {
    async fn subscribe(&self, email: &str) -> Result<(), AppError> {
        if !email.contains('@') {
            return Err(AppError::Validation("invalid email address".to_string()));
        }
        let mut emails = self.emails.write().expect("subscription lock poisoned");
        if !emails.insert(email.to_lowercase()) {
            return Err(AppError::Conflict("already subscribed".to_string()));
        }
        Ok(())
    }
}
