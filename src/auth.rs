//! Credential verification, grounded on the original `UserVerify` (which
//! reads/writes a `user` table through `SqlConnPool`). The pool itself is
//! an external collaborator out of scope for this crate (see DESIGN.md);
//! this module only owns the trait boundary plus an in-memory stand-in
//! good enough to drive the login/register endpoints end to end.

use std::collections::HashMap;
use std::sync::Mutex;

/// External credential store. A real implementation would hold a
/// database connection pool behind this trait; that pool is explicitly
/// out of scope here.
pub trait AuthBackend: Send + Sync {
    /// `is_login = true`: succeed iff username/password match an
    /// existing record. `is_login = false`: succeed iff the username is
    /// new and the record is inserted.
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool;
}

/// In-memory stand-in, used by tests and as the default backend when no
/// database is configured.
#[derive(Default)]
pub struct InMemoryAuthBackend {
    users: Mutex<HashMap<String, String>>,
}

impl InMemoryAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthBackend for InMemoryAuthBackend {
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool {
        let mut users = self.users.lock().unwrap();
        if is_login {
            users.get(username).is_some_and(|p| p == password)
        } else if users.contains_key(username) {
            false
        } else {
            users.insert(username.to_string(), password.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_login_succeeds() {
        let backend = InMemoryAuthBackend::new();
        assert!(backend.verify("alice", "secret", false));
        assert!(backend.verify("alice", "secret", true));
    }

    #[test]
    fn login_with_wrong_password_fails() {
        let backend = InMemoryAuthBackend::new();
        assert!(backend.verify("alice", "secret", false));
        assert!(!backend.verify("alice", "wrong", true));
    }

    #[test]
    fn duplicate_registration_fails() {
        let backend = InMemoryAuthBackend::new();
        assert!(backend.verify("alice", "secret", false));
        assert!(!backend.verify("alice", "other", false));
    }

    #[test]
    fn login_unknown_user_fails() {
        let backend = InMemoryAuthBackend::new();
        assert!(!backend.verify("ghost", "x", true));
    }
}
