//! Quotation use-case service.
//!
//! # Responsibility
//! - Provide quotation draft/send/verdict APIs with derived totals.
//! - Enforce the lifecycle transition table and draft-only item edits.
//!
//! # Invariants
//! - A quotation is sent only with at least one line item.
//! - Accept/decline/expire are only reachable from `sent`.

use crate::model::line_item::{normalize_items, LineItem};
use crate::model::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::model::ValidationError;
use crate::repo::quotation_repo::{QuotationDetail, QuotationListQuery, QuotationRepository};
use crate::repo::{RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for quotation use-cases.
#[derive(Debug)]
pub enum QuotationServiceError {
    QuotationNotFound(QuotationId),
    InvalidTransition {
        from: QuotationStatus,
        to: QuotationStatus,
    },
    /// Item replacement on a non-draft quotation.
    NotDraft(QuotationStatus),
    /// Sending an empty quotation.
    NoItems(QuotationId),
    Validation(ValidationError),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for QuotationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotationNotFound(id) => write!(f, "quotation not found: {id}"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "quotation cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::NotDraft(status) => write!(
                f,
                "quotation in status `{}` no longer accepts item edits",
                status.as_str()
            ),
            Self::NoItems(id) => write!(f, "quotation {id} has no items"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent quotation state: {details}")
            }
        }
    }
}

impl Error for QuotationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for QuotationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "quotation",
                id,
            } => Self::QuotationNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Quotation service facade over repository implementations.
pub struct QuotationService<R: QuotationRepository> {
    repo: R,
}

impl<R: QuotationRepository> QuotationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new draft with a normalized item set.
    pub fn create_draft(
        &mut self,
        quotation: Quotation,
        mut items: Vec<LineItem>,
    ) -> Result<QuotationDetail, QuotationServiceError> {
        normalize_items(&mut items).map_err(QuotationServiceError::Validation)?;
        Ok(self.repo.create_quotation(&quotation, &items)?)
    }

    /// Replaces the whole item set of a draft.
    pub fn replace_items(
        &mut self,
        id: QuotationId,
        mut items: Vec<LineItem>,
    ) -> Result<QuotationDetail, QuotationServiceError> {
        normalize_items(&mut items).map_err(QuotationServiceError::Validation)?;

        let detail = self.require_detail(id)?;
        if detail.quotation.status != QuotationStatus::Draft {
            return Err(QuotationServiceError::NotDraft(detail.quotation.status));
        }

        self.repo.replace_items(id, &items)?;
        self.require_detail(id)
    }

    /// Marks a draft as sent to the client.
    pub fn send(&mut self, id: QuotationId) -> Result<QuotationDetail, QuotationServiceError> {
        let detail = self.require_detail(id)?;
        if detail.items.is_empty() {
            return Err(QuotationServiceError::NoItems(id));
        }
        self.transition_from(detail, QuotationStatus::Sent)
    }

    pub fn accept(&mut self, id: QuotationId) -> Result<QuotationDetail, QuotationServiceError> {
        let detail = self.require_detail(id)?;
        self.transition_from(detail, QuotationStatus::Accepted)
    }

    pub fn decline(&mut self, id: QuotationId) -> Result<QuotationDetail, QuotationServiceError> {
        let detail = self.require_detail(id)?;
        self.transition_from(detail, QuotationStatus::Declined)
    }

    pub fn expire(&mut self, id: QuotationId) -> Result<QuotationDetail, QuotationServiceError> {
        let detail = self.require_detail(id)?;
        self.transition_from(detail, QuotationStatus::Expired)
    }

    pub fn get_detail(&self, id: QuotationId) -> RepoResult<Option<QuotationDetail>> {
        self.repo.get_detail(id)
    }

    pub fn list_quotations(&self, query: &QuotationListQuery) -> RepoResult<Vec<Quotation>> {
        self.repo.list_quotations(query)
    }

    fn require_detail(
        &self,
        id: QuotationId,
    ) -> Result<QuotationDetail, QuotationServiceError> {
        self.repo
            .get_detail(id)?
            .ok_or(QuotationServiceError::QuotationNotFound(id))
    }

    fn transition_from(
        &mut self,
        detail: QuotationDetail,
        to: QuotationStatus,
    ) -> Result<QuotationDetail, QuotationServiceError> {
        let from = detail.quotation.status;
        let id = detail.quotation.id;
        if !from.can_transition(to) {
            return Err(QuotationServiceError::InvalidTransition { from, to });
        }

        // The guarded update re-checks `from`; a concurrent writer makes
        // it report a stale move instead of overwriting.
        if !self.repo.set_status(id, from, to)? {
            let current = self.require_detail(id)?;
            return Err(QuotationServiceError::InvalidTransition {
                from: current.quotation.status,
                to,
            });
        }

        self.require_detail(id)
    }
}
