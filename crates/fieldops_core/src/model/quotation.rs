//! Quotation record and lifecycle states.
//!
//! # Invariants
//! - Line items are editable only while the quotation is `draft`.
//! - `accepted` is the precondition for creating a job order from it.

use super::client::{ClientId, SiteId};
use super::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable quotation identifier.
pub type QuotationId = Uuid;

/// Lifecycle state of a quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Expired,
}

impl QuotationStatus {
    pub fn can_transition(self, next: QuotationStatus) -> bool {
        use QuotationStatus::{Accepted, Declined, Draft, Expired, Sent};
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Accepted) | (Sent, Declined) | (Sent, Expired)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A priced proposal presented to a client before invoicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    /// Human document number (`Q-0001`), allocated by storage on create.
    pub number: String,
    pub client_id: ClientId,
    pub site_id: Option<SiteId>,
    pub status: QuotationStatus,
    /// Offer expiry, epoch milliseconds.
    pub valid_until: Option<i64>,
    /// Tax rate in basis points (2100 = 21%).
    pub tax_rate_bp: u32,
    pub notes: Option<String>,
}

impl Quotation {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: String::new(),
            client_id,
            site_id: None,
            status: QuotationStatus::Draft,
            valid_until: None,
            tax_rate_bp: 0,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(valid_until) = self.valid_until {
            if valid_until <= 0 {
                return Err(ValidationError::EmptyTimeRange {
                    starts_at: 0,
                    ends_at: valid_until,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::QuotationStatus;

    #[test]
    fn only_sent_quotations_reach_a_verdict() {
        assert!(QuotationStatus::Draft.can_transition(QuotationStatus::Sent));
        assert!(QuotationStatus::Sent.can_transition(QuotationStatus::Accepted));
        assert!(!QuotationStatus::Draft.can_transition(QuotationStatus::Accepted));
        assert!(!QuotationStatus::Accepted.can_transition(QuotationStatus::Declined));
    }
}
