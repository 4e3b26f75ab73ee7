//! Session-store abstraction.
//!
//! Request handlers resolve bearer tokens to usernames through this trait;
//! the backing implementation is a swappable collaborator (in-memory map
//! here, an external cache elsewhere), never baked into the core. Callers
//! must not assume atomicity across create/resolve/revoke — the contract
//! is read-modify-write, last writer wins.

use std::collections::HashMap;
use std::sync::Mutex;

/// Token-to-username session store.
pub trait SessionStore: Send + Sync {
    /// Open a session and return its opaque token.
    fn create(&self, username: &str) -> String;

    /// Resolve a token to its username, if the session exists.
    fn resolve(&self, token: &str) -> Option<String>;

    /// Close a session. Returns whether the token existed.
    fn revoke(&self, token: &str) -> bool;
}

/// In-memory session store. Sessions live for the process lifetime only.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, username: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions
            .lock()
            .expect("session lock")
            .insert(token.clone(), username.to_string());
        token
    }

    fn resolve(&self, token: &str) -> Option<String> {
        self.sessions.lock().expect("session lock").get(token).cloned()
    }

    fn revoke(&self, token: &str) -> bool {
        self.sessions
            .lock()
            .expect("session lock")
            .remove(token)
            .is_some()
    }
}
