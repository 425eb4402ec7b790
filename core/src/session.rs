//! Persisted sign-in state.
//!
//! # Design
//! The host owns the key-value storage (browser local storage, a keychain, a
//! file). The core only needs `get`/`set`/`remove` on string keys, expressed
//! by `SessionStore`. The session is two keys: the raw token and the user
//! profile as JSON.

use std::collections::HashMap;

use crate::error::ApiError;
use crate::types::{AuthResponse, User};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// String key-value storage supplied by the host.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// In-process store, used by tests and by hosts without durable storage.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// A signed-in user and their token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub jwt: String,
    pub user: User,
}

impl Session {
    pub fn save(store: &mut impl SessionStore, auth: &AuthResponse) {
        store.set(TOKEN_KEY, auth.jwt.clone());
        match serde_json::to_string(&auth.user) {
            Ok(user) => store.set(USER_KEY, user),
            Err(e) => {
                tracing::error!(error = %e, "could not serialize user profile");
                store.remove(USER_KEY);
            }
        }
    }

    /// Restore a saved session. A corrupt profile clears both keys so the
    /// user is asked to sign in again.
    pub fn load(store: &mut impl SessionStore) -> Option<Session> {
        let jwt = store.get(TOKEN_KEY)?;
        let raw_user = store.get(USER_KEY)?;
        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => Some(Session { jwt, user }),
            Err(e) => {
                tracing::warn!(error = %e, "stored user profile is corrupt, clearing session");
                Self::clear(store);
                None
            }
        }
    }

    pub fn clear(store: &mut impl SessionStore) {
        store.remove(TOKEN_KEY);
        store.remove(USER_KEY);
    }

    /// Clear the session when `error` says the token was rejected. Returns
    /// whether the session was cleared.
    pub fn invalidate_on(store: &mut impl SessionStore, error: &ApiError) -> bool {
        if !error.is_unauthorized() {
            return false;
        }
        tracing::info!("token rejected, signing out");
        Self::clear(store);
        true
    }
}
