//! Session management: records, principals, cookie discipline, resolver
//! middleware and the expiry sweeper.

pub mod manager;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

pub use manager::{resolve_session, spawn_sweeper, SessionManager, SessionRecord};

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The resolved identity on a request. Installed into the request
/// extensions by the session resolver and immutable for the lifetime of
/// the request.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    Authenticated {
        user_id: String,
        role: Role,
        session_id: String,
        issued_at: SystemTime,
        expires_at: SystemTime,
    },
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::Authenticated { .. })
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Principal::Authenticated {
                role: Role::Admin,
                ..
            }
        )
    }
}

/// Generate an opaque token: 256 bits of OS entropy, base64url without
/// padding. Used for session ids and CSRF tokens alike.
pub(crate) fn opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_tokens_are_distinct_and_long_enough() {
        let a = opaque_token();
        let b = opaque_token();
        assert_ne!(a, b);
        // 32 bytes of entropy encode to 43 base64url characters.
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
    }

    #[test]
    fn principal_role_checks() {
        assert!(!Principal::Anonymous.is_authenticated());
        let admin = Principal::Authenticated {
            user_id: "u1".to_string(),
            role: Role::Admin,
            session_id: "s1".to_string(),
            issued_at: SystemTime::now(),
            expires_at: SystemTime::now(),
        };
        assert!(admin.is_authenticated());
        assert!(admin.is_admin());
    }
}
