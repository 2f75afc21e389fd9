//! User record and role capabilities.
//!
//! # Invariants
//! - Usernames are unique, lowercase, and stable once created.
//! - Only active users authenticate or appear on crews/schedules.

use super::{check_username, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user identifier.
pub type UserId = Uuid;

/// Coarse permission tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Technician,
}

impl Role {
    /// May create and mutate business documents.
    pub fn can_manage_documents(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    /// May create, update and deactivate user accounts.
    pub fn can_manage_users(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Technician => "technician",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "technician" => Some(Self::Technician),
            _ => None,
        }
    }
}

/// An employee account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Opaque to core; produced and verified by the credential layer.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            display_name: display_name.into(),
            role,
            password_hash: password_hash.into(),
            active: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_username(&self.username)?;
        require_text("display_name", &self.display_name)?;
        require_text("password_hash", &self.password_hash)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, User};

    #[test]
    fn technician_is_read_mostly() {
        assert!(!Role::Technician.can_manage_documents());
        assert!(Role::Manager.can_manage_documents());
        assert!(!Role::Manager.can_manage_users());
        assert!(Role::Admin.can_manage_users());
    }

    #[test]
    fn uppercase_usernames_are_rejected() {
        let user = User::new("JDoe", "J. Doe", Role::Technician, "hash");
        assert!(user.validate().is_err());
    }
}
