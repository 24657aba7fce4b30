//! Password hashing and session tokens
//!
//! Passwords are stored as Argon2id PHC strings. Sessions live in memory only:
//! restarting the server logs everybody out.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::entities::user::User;
use crate::error::{FleetError, Result};

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| FleetError::InvalidInput(format!("failed to hash password: {e}")))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| FleetError::InvalidInput(format!("invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// The part of a user a request handler needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            id: user.id,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
        }
    }
}

/// Token → user map shared by all request handlers
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionUser>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its token
    pub fn issue(&self, user: SessionUser) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        debug!(user_id = user.id, "Session issued");
        self.write().insert(token.clone(), user);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<SessionUser> {
        self.read().get(token).cloned()
    }

    /// Returns true when the token was live
    pub fn revoke(&self, token: &str) -> bool {
        self.write().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another handler panicked mid-insert; the map
    // itself is still usable.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionUser>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionUser>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "fleet-manager-2024";
        let hash = hash_password(password).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_different_salts() {
        let hash1 = hash_password("same").unwrap();
        let hash2 = hash_password("same").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("password", "not-a-valid-hash").is_err());
    }

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::new();
        let user = SessionUser {
            id: 1,
            username: "admin".to_string(),
            role: "admin".to_string(),
        };

        let token = store.issue(user.clone());
        assert_eq!(store.resolve(&token), Some(user));
        assert_eq!(store.len(), 1);

        assert!(store.revoke(&token));
        assert!(store.resolve(&token).is_none());
        assert!(!store.revoke(&token));
        assert!(store.is_empty());
    }

    #[test]
    fn test_tokens_are_distinct() {
        let store = SessionStore::new();
        let user = SessionUser {
            id: 7,
            username: "dispatcher".to_string(),
            role: "user".to_string(),
        };

        let a = store.issue(user.clone());
        let b = store.issue(user);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
