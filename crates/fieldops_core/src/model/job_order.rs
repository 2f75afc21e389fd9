//! Job order record, lifecycle states and status history.
//!
//! # Responsibility
//! - Represent a scheduled unit of work performed at a site for a client.
//! - Guard the job lifecycle transition table.
//!
//! # Invariants
//! - `completed` and `cancelled` are terminal.
//! - Every applied transition appends one status-update row.
//! - Completed and in-progress jobs cannot be deleted.

use super::client::{ClientId, SiteId};
use super::quotation::QuotationId;
use super::user::UserId;
use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable job order identifier.
pub type JobOrderId = Uuid;

/// Lifecycle state of a job order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Returns whether the lifecycle allows moving `self -> next`.
    pub fn can_transition(self, next: JobStatus) -> bool {
        use JobStatus::{Cancelled, Completed, InProgress, Pending, Scheduled};
        matches!(
            (self, next),
            (Pending, Scheduled) | (Pending, Cancelled)
                | (Scheduled, InProgress)
                | (Scheduled, Pending)
                | (Scheduled, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Whether the job may still be deleted from storage.
    pub fn deletable(self) -> bool {
        !matches!(self, JobStatus::Completed | JobStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A unit of work ordered by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOrder {
    pub id: JobOrderId,
    /// Human document number (`JOB-0001`), allocated by storage on create.
    pub number: String,
    pub client_id: ClientId,
    pub site_id: Option<SiteId>,
    /// Set when the job was created from an accepted quotation.
    pub quotation_id: Option<QuotationId>,
    pub title: String,
    pub description: Option<String>,
    pub status: JobStatus,
}

impl JobOrder {
    pub fn new(client_id: ClientId, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: String::new(),
            client_id,
            site_id: None,
            quotation_id: None,
            title: title.into(),
            description: None,
            status: JobStatus::Pending,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

/// One append-only row in a job's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub id: Uuid,
    pub job_order_id: JobOrderId,
    pub from_status: JobStatus,
    pub to_status: JobStatus,
    pub note: Option<String>,
    pub changed_by: UserId,
    /// Epoch milliseconds, stamped by storage.
    pub changed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::JobStatus;

    #[test]
    fn lifecycle_moves_forward_with_one_rollback_edge() {
        assert!(JobStatus::Pending.can_transition(JobStatus::Scheduled));
        assert!(JobStatus::Scheduled.can_transition(JobStatus::InProgress));
        assert!(JobStatus::Scheduled.can_transition(JobStatus::Pending));
        assert!(JobStatus::InProgress.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition(JobStatus::Pending));
    }

    #[test]
    fn delete_guard_tracks_status() {
        assert!(JobStatus::Pending.deletable());
        assert!(JobStatus::Cancelled.deletable());
        assert!(!JobStatus::InProgress.deletable());
        assert!(!JobStatus::Completed.deletable());
    }
}
