//! Invoice use-case service.
//!
//! # Responsibility
//! - Provide invoice draft/send/payment/void APIs with derived balances.
//! - Enforce invoicing preconditions above the repository transactions.
//!
//! # Invariants
//! - Invoices created from a job require the job to be completed.
//! - An invoice is sent only with at least one line item.
//! - Payment acceptance, overpayment rejection and status recomputation
//!   happen inside the repository transaction.

use crate::model::invoice::{Invoice, InvoiceId, InvoiceStatus, Payment, PaymentMethod};
use crate::model::job_order::JobStatus;
use crate::model::line_item::{normalize_items, LineItem};
use crate::model::ValidationError;
use crate::repo::invoice_repo::{
    InvoiceDetail, InvoiceListQuery, InvoiceRepoError, InvoiceRepository,
};
use crate::repo::job_repo::JobDetail;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Service error for invoice use-cases.
#[derive(Debug)]
pub enum InvoiceServiceError {
    InvoiceNotFound(InvoiceId),
    /// Item replacement on a non-draft invoice.
    ItemsLocked(InvoiceId),
    /// Sending an empty invoice.
    NoItems(InvoiceId),
    /// Invoice creation from a job that is not completed.
    JobNotCompleted(JobStatus),
    PaymentNotAllowed(InvoiceStatus),
    Overpayment {
        attempted_cents: i64,
        balance_cents: i64,
    },
    VoidWithPayments(InvoiceId),
    VoidNotAllowed(InvoiceStatus),
    /// Send raced with a concurrent status change.
    StaleStatus(InvoiceId),
    Validation(ValidationError),
    Repo(InvoiceRepoError),
}

impl Display for InvoiceServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvoiceNotFound(id) => write!(f, "invoice not found: {id}"),
            Self::ItemsLocked(id) => {
                write!(f, "invoice {id} is not a draft; items are locked")
            }
            Self::NoItems(id) => write!(f, "invoice {id} has no items"),
            Self::JobNotCompleted(status) => write!(
                f,
                "invoices require a completed job order, got `{}`",
                status.as_str()
            ),
            Self::PaymentNotAllowed(status) => write!(
                f,
                "invoice does not accept payments in status `{}`",
                status.as_str()
            ),
            Self::Overpayment {
                attempted_cents,
                balance_cents,
            } => write!(
                f,
                "payment of {attempted_cents} cents exceeds open balance of {balance_cents} cents"
            ),
            Self::VoidWithPayments(id) => {
                write!(f, "invoice {id} has payments and cannot be voided")
            }
            Self::VoidNotAllowed(status) => write!(
                f,
                "invoice cannot be voided from status `{}`",
                status.as_str()
            ),
            Self::StaleStatus(id) => write!(f, "invoice {id} changed status concurrently"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InvoiceServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvoiceRepoError> for InvoiceServiceError {
    fn from(value: InvoiceRepoError) -> Self {
        match value {
            InvoiceRepoError::NotFound(id) => Self::InvoiceNotFound(id),
            InvoiceRepoError::ItemsLocked(id) => Self::ItemsLocked(id),
            InvoiceRepoError::PaymentNotAllowed { status, .. } => Self::PaymentNotAllowed(status),
            InvoiceRepoError::Overpayment {
                attempted_cents,
                balance_cents,
                ..
            } => Self::Overpayment {
                attempted_cents,
                balance_cents,
            },
            InvoiceRepoError::VoidWithPayments(id) => Self::VoidWithPayments(id),
            InvoiceRepoError::VoidNotAllowed { status, .. } => Self::VoidNotAllowed(status),
            InvoiceRepoError::StaleStatus(id) => Self::StaleStatus(id),
            InvoiceRepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Invoice service facade over repository implementations.
pub struct InvoiceService<R: InvoiceRepository> {
    repo: R,
}

impl<R: InvoiceRepository> InvoiceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new draft with a normalized item set.
    pub fn create_draft(
        &mut self,
        mut invoice: Invoice,
        mut items: Vec<LineItem>,
    ) -> Result<InvoiceDetail, InvoiceServiceError> {
        invoice.status = InvoiceStatus::Draft;
        invoice.validate().map_err(InvoiceServiceError::Validation)?;
        normalize_items(&mut items).map_err(InvoiceServiceError::Validation)?;
        Ok(self.repo.create_invoice(&invoice, &items)?)
    }

    /// Creates an invoice billing a completed job order.
    pub fn create_from_job(
        &mut self,
        job: &JobDetail,
        mut invoice: Invoice,
        items: Vec<LineItem>,
    ) -> Result<InvoiceDetail, InvoiceServiceError> {
        if job.job.status != JobStatus::Completed {
            return Err(InvoiceServiceError::JobNotCompleted(job.job.status));
        }

        invoice.client_id = job.job.client_id;
        invoice.job_order_id = Some(job.job.id);
        self.create_draft(invoice, items)
    }

    /// Replaces the whole item set of a draft.
    pub fn replace_items(
        &mut self,
        id: InvoiceId,
        mut items: Vec<LineItem>,
    ) -> Result<InvoiceDetail, InvoiceServiceError> {
        normalize_items(&mut items).map_err(InvoiceServiceError::Validation)?;
        self.repo.replace_items(id, &items)?;
        self.require_detail(id)
    }

    /// Marks a draft as sent; requires at least one line item.
    pub fn send(&mut self, id: InvoiceId) -> Result<InvoiceDetail, InvoiceServiceError> {
        let detail = self.require_detail(id)?;
        if detail.items.is_empty() {
            return Err(InvoiceServiceError::NoItems(id));
        }
        self.repo.mark_sent(id)?;
        self.require_detail(id)
    }

    /// Records a payment; overpayment and status recomputation are
    /// handled atomically by the repository.
    pub fn record_payment(
        &mut self,
        id: InvoiceId,
        amount_cents: i64,
        method: PaymentMethod,
        reference: Option<String>,
        paid_at: i64,
        notes: Option<String>,
    ) -> Result<InvoiceDetail, InvoiceServiceError> {
        let payment = Payment {
            id: Uuid::new_v4(),
            invoice_id: id,
            amount_cents,
            method,
            reference,
            paid_at,
            notes,
        };
        payment.validate().map_err(InvoiceServiceError::Validation)?;
        Ok(self.repo.record_payment(&payment)?)
    }

    /// Voids a draft/sent invoice that has no payments.
    pub fn void(&mut self, id: InvoiceId) -> Result<InvoiceDetail, InvoiceServiceError> {
        self.repo.void_invoice(id)?;
        self.require_detail(id)
    }

    pub fn get_detail(&self, id: InvoiceId) -> Result<Option<InvoiceDetail>, InvoiceServiceError> {
        Ok(self.repo.get_detail(id)?)
    }

    pub fn list_invoices(
        &self,
        query: &InvoiceListQuery,
    ) -> Result<Vec<Invoice>, InvoiceServiceError> {
        Ok(self.repo.list_invoices(query)?)
    }

    fn require_detail(&self, id: InvoiceId) -> Result<InvoiceDetail, InvoiceServiceError> {
        self.repo
            .get_detail(id)?
            .ok_or(InvoiceServiceError::InvoiceNotFound(id))
    }
}
