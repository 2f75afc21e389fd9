//! Client and site records.
//!
//! # Invariants
//! - Clients are archived, never hard-deleted.
//! - A site always belongs to exactly one client.

use super::{check_email, check_phone, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable client identifier.
pub type ClientId = Uuid;
/// Stable site identifier.
pub type SiteId = Uuid;

/// A customer the business performs work for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Archived clients are hidden from default listings but keep history.
    pub archived: bool,
}

impl Client {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            contact_name: None,
            email: None,
            phone: None,
            archived: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        check_email(self.email.as_deref())?;
        check_phone(self.phone.as_deref())?;
        Ok(())
    }
}

/// A physical location where work is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub client_id: ClientId,
    /// Short human label, e.g. "Warehouse" or "Head office".
    pub label: String,
    pub address: String,
    /// Gate codes, key-holder contacts and similar crew-facing notes.
    pub access_notes: Option<String>,
}

impl Site {
    pub fn new(
        client_id: ClientId,
        label: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            label: label.into(),
            address: address.into(),
            access_notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("label", &self.label)?;
        require_text("address", &self.address)?;
        Ok(())
    }
}
