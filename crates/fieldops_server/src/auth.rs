//! Credential hashing, sessions and the role gate.
//!
//! # Invariants
//! - Password hashes are `sha256(salt + password)` hex, stored as
//!   `salt$digest`; the salt is per-user random.
//! - Session tokens are opaque random UUIDs with a fixed TTL.
//! - Expired sessions are pruned lazily on lookup.

use fieldops_core::{Role, UserId};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Hashes a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest_with_salt(&salt, password))
}

/// Verifies a candidate password against a stored `salt$digest` hash.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => digest_with_salt(salt, candidate) == digest,
        None => false,
    }
}

fn digest_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// What a route requires from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read any business data.
    Read,
    /// Update job/schedule statuses from the field.
    OperateStatus,
    /// Create and mutate business documents.
    ManageDocuments,
    /// Manage user accounts.
    ManageUsers,
}

/// Role policy: technicians read and operate statuses, managers run the
/// business, admins additionally manage accounts.
pub fn role_allows(role: Role, permission: Permission) -> bool {
    match permission {
        Permission::Read | Permission::OperateStatus => true,
        Permission::ManageDocuments => role.can_manage_documents(),
        Permission::ManageUsers => role.can_manage_users(),
    }
}

/// The authenticated caller attached to a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

struct Session {
    context: AuthContext,
    expires_at: Instant,
}

/// In-memory token store; sessions die with the process.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token for an authenticated user.
    pub fn issue(&mut self, context: AuthContext) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                context,
                expires_at: Instant::now() + SESSION_TTL,
            },
        );
        token
    }

    /// Resolves a token, pruning it when expired.
    pub fn resolve(&mut self, token: &str) -> Option<AuthContext> {
        match self.sessions.get(token) {
            Some(session) if session.expires_at > Instant::now() => {
                Some(session.context.clone())
            }
            Some(_) => {
                self.sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{hash_password, role_allows, verify_password, Permission};
    use fieldops_core::Role;

    #[test]
    fn hash_roundtrip_verifies_and_rejects() {
        let stored = hash_password("hunter2");
        assert!(verify_password(&stored, "hunter2"));
        assert!(!verify_password(&stored, "hunter3"));
        assert!(!verify_password("garbage-without-salt", "hunter2"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn technicians_operate_but_do_not_manage() {
        assert!(role_allows(Role::Technician, Permission::Read));
        assert!(role_allows(Role::Technician, Permission::OperateStatus));
        assert!(!role_allows(Role::Technician, Permission::ManageDocuments));
        assert!(!role_allows(Role::Manager, Permission::ManageUsers));
        assert!(role_allows(Role::Admin, Permission::ManageUsers));
    }
}
