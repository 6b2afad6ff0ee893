//! Identity resolution
//!
//! Authentication lives outside this crate. Callers hand us whatever session
//! token they hold and an [`IdentityProvider`] turns it into a user id, or
//! nothing when the session is unknown.

use learnmore_core::UserId;
use std::collections::HashMap;
use std::sync::RwLock;

/// Source of the currently authenticated user
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token to the user it belongs to
    fn resolve_session(&self, session_token: &str) -> Option<UserId>;
}

/// In-memory session table for tests and operator tooling
///
/// A panic while the table is locked does not disable it: later calls keep
/// using the sessions as they were left.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    sessions: RwLock<HashMap<String, UserId>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known token for a user
    pub fn insert_session(&self, session_token: impl Into<String>, user_id: impl Into<UserId>) {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session_token.into(), user_id.into());
    }

    /// Issue a fresh random session token for a user
    pub fn issue_session(&self, user_id: impl Into<UserId>) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.insert_session(token.clone(), user_id);
        token
    }

    pub fn revoke_session(&self, session_token: &str) {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_token);
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn resolve_session(&self, session_token: &str) -> Option<UserId> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(session_token)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_issued_sessions_resolve_until_revoked() {
        let provider = StaticIdentityProvider::new();
        let token = provider.issue_session("student-1");

        assert_eq!(provider.resolve_session(&token).as_deref(), Some("student-1"));
        assert!(provider.resolve_session("forged").is_none());

        provider.revoke_session(&token);
        assert!(provider.resolve_session(&token).is_none());
    }

    #[test]
    fn test_sessions_survive_a_poisoned_lock() {
        let provider = Arc::new(StaticIdentityProvider::new());
        let before = provider.issue_session("student-1");

        let poisoner = Arc::clone(&provider);
        let outcome = std::thread::spawn(move || {
            let _guard = poisoner.sessions.write().unwrap();
            panic!("worker crashed while holding the session table");
        })
        .join();
        assert!(outcome.is_err());
        assert!(provider.sessions.is_poisoned());

        let after = provider.issue_session("student-2");
        assert_eq!(provider.resolve_session(&before).as_deref(), Some("student-1"));
        assert_eq!(provider.resolve_session(&after).as_deref(), Some("student-2"));

        provider.revoke_session(&before);
        assert!(provider.resolve_session(&before).is_none());
    }
}
