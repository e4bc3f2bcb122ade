//! Session abstraction over the hosting environment's per-client store.

use std::collections::HashMap;

/// Session key holding the authenticated admin identity id.
pub const IDENTITY_KEY: &str = "mark.identity";

/// Session key holding the cached role list for the identity.
pub const ROLES_KEY: &str = "mark.roles";

/// Minimal contract over a per-client session store.
///
/// One session belongs to one request lifecycle; no cross-request locking is
/// needed, the hosting environment keys sessions per client.
pub trait Session {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn unset(&mut self, key: &str);
}

/// Remove every identity-derived key so a stale principal cannot be reused
/// after a failed resolution or authorization.
pub fn clear_identity(session: &mut dyn Session) {
    session.unset(IDENTITY_KEY);
    session.unset(ROLES_KEY);
}

/// In-memory session, for tests and embedders without a real store.
#[derive(Debug, Default, Clone)]
pub struct MemorySession {
    values: HashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session pre-seeded with an authenticated identity.
    pub fn with_identity(id: &str) -> Self {
        let mut session = Self::new();
        session.set(IDENTITY_KEY, id);
        session
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_identity_removes_all_identity_keys() {
        let mut session = MemorySession::with_identity("alice");
        session.set(ROLES_KEY, "mark");
        session.set("csrf", "token");

        clear_identity(&mut session);

        assert!(session.get(IDENTITY_KEY).is_none());
        assert!(session.get(ROLES_KEY).is_none());
        assert_eq!(session.get("csrf").as_deref(), Some("token"));
    }
}
