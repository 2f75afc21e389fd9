//! Invoice and payment records.
//!
//! # Responsibility
//! - Represent billing documents and the money received against them.
//! - Derive invoice status from payment totals.
//!
//! # Invariants
//! - The sum of payments never exceeds the invoice total.
//! - Status is recomputed from payment totals after every payment.
//! - Void requires zero recorded payments.

use super::client::ClientId;
use super::job_order::JobOrderId;
use super::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable invoice identifier.
pub type InvoiceId = Uuid;
/// Stable payment identifier.
pub type PaymentId = Uuid;

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
    Void,
}

impl InvoiceStatus {
    /// Whether payments may currently be recorded.
    pub fn accepts_payments(self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::PartiallyPaid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "partially_paid" => Some(Self::PartiallyPaid),
            "paid" => Some(Self::Paid),
            "void" => Some(Self::Void),
            _ => None,
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::Cheque => "cheque",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(Self::Cash),
            "bank_transfer" => Some(Self::BankTransfer),
            "card" => Some(Self::Card),
            "cheque" => Some(Self::Cheque),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A billing document issued to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human document number (`INV-0001`), allocated by storage on create.
    pub number: String,
    pub client_id: ClientId,
    pub job_order_id: Option<JobOrderId>,
    pub status: InvoiceStatus,
    /// Issue date, epoch milliseconds.
    pub issued_at: i64,
    pub due_at: Option<i64>,
    /// Tax rate in basis points.
    pub tax_rate_bp: u32,
    pub notes: Option<String>,
}

impl Invoice {
    pub fn new(client_id: ClientId, issued_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: String::new(),
            client_id,
            job_order_id: None,
            status: InvoiceStatus::Draft,
            issued_at,
            due_at: None,
            tax_rate_bp: 0,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(due_at) = self.due_at {
            if due_at < self.issued_at {
                return Err(ValidationError::EmptyTimeRange {
                    starts_at: self.issued_at,
                    ends_at: due_at,
                });
            }
        }
        Ok(())
    }
}

/// Money received against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// External reference, e.g. bank statement line or receipt number.
    pub reference: Option<String>,
    /// Epoch milliseconds.
    pub paid_at: i64,
    pub notes: Option<String>,
}

impl Payment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount_cents <= 0 {
            return Err(ValidationError::NonPositiveAmount(self.amount_cents));
        }
        Ok(())
    }
}

/// Recomputes invoice status from payment totals.
///
/// Only meaningful for invoices that accept payments; draft/void/paid
/// states are handled by their own operations.
pub fn status_from_payments(total_cents: i64, paid_cents: i64) -> InvoiceStatus {
    if paid_cents >= total_cents && total_cents > 0 {
        InvoiceStatus::Paid
    } else if paid_cents > 0 {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::{status_from_payments, InvoiceStatus};

    #[test]
    fn status_follows_paid_fraction() {
        assert_eq!(status_from_payments(10_000, 0), InvoiceStatus::Sent);
        assert_eq!(
            status_from_payments(10_000, 2_500),
            InvoiceStatus::PartiallyPaid
        );
        assert_eq!(status_from_payments(10_000, 10_000), InvoiceStatus::Paid);
    }

    #[test]
    fn zero_total_invoice_never_reports_paid() {
        assert_eq!(status_from_payments(0, 0), InvoiceStatus::Sent);
    }
}
