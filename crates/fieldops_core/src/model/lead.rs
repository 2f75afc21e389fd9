//! Lead record and pipeline states.
//!
//! # Responsibility
//! - Represent a prospective customer prior to conversion into a client.
//! - Guard the pipeline transition table.
//!
//! # Invariants
//! - A lead always carries at least one of email/phone.
//! - `converted` and `lost` are terminal; `converted_client_id` is set
//!   exactly when status is `converted`.

use super::client::ClientId;
use super::{check_email, check_phone, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable lead identifier.
pub type LeadId = Uuid;

/// Pipeline state for a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    /// Returns whether a direct pipeline move `self -> next` is allowed.
    ///
    /// `Converted` is never a valid target here; conversion happens only
    /// through the dedicated convert operation.
    pub fn can_transition(self, next: LeadStatus) -> bool {
        use LeadStatus::{Contacted, Lost, New, Qualified};
        matches!(
            (self, next),
            (New, Contacted) | (New, Qualified) | (New, Lost)
                | (Contacted, Qualified)
                | (Contacted, Lost)
                | (Qualified, Lost)
        )
    }

    /// Whether conversion into a client is still possible from this state.
    pub fn convertible(self) -> bool {
        !matches!(self, LeadStatus::Converted | LeadStatus::Lost)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Converted => "converted",
            Self::Lost => "lost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "contacted" => Some(Self::Contacted),
            "qualified" => Some(Self::Qualified),
            "converted" => Some(Self::Converted),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

/// A prospective customer inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Where the inquiry came from (referral, website, phone-in).
    pub source: Option<String>,
    /// Free-form service address quoted by the prospect.
    pub address: Option<String>,
    pub notes: Option<String>,
    pub status: LeadStatus,
    pub converted_client_id: Option<ClientId>,
}

impl Lead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            phone: None,
            source: None,
            address: None,
            notes: None,
            status: LeadStatus::New,
            converted_client_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.email.is_none() && self.phone.is_none() {
            return Err(ValidationError::MissingContact);
        }
        check_email(self.email.as_deref())?;
        check_phone(self.phone.as_deref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Lead, LeadStatus};

    #[test]
    fn terminal_states_accept_no_moves() {
        for next in [
            LeadStatus::New,
            LeadStatus::Contacted,
            LeadStatus::Qualified,
            LeadStatus::Lost,
        ] {
            assert!(!LeadStatus::Converted.can_transition(next));
            assert!(!LeadStatus::Lost.can_transition(next));
        }
    }

    #[test]
    fn converted_is_never_a_direct_target() {
        assert!(!LeadStatus::Qualified.can_transition(LeadStatus::Converted));
        assert!(LeadStatus::Qualified.convertible());
        assert!(!LeadStatus::Lost.convertible());
    }

    #[test]
    fn lead_requires_some_contact_channel() {
        let mut lead = Lead::new("Acme Bakery");
        assert!(lead.validate().is_err());
        lead.phone = Some("+31201234567".to_string());
        assert!(lead.validate().is_ok());
    }
}
