//! Schedule entry record, slot semantics and transition table.
//!
//! # Responsibility
//! - Represent a time-boxed assignment of one or more employees.
//! - Define which states block a time slot and how intervals overlap.
//!
//! # Invariants
//! - `[starts_at, ends_at)` is half-open; `ends_at` is strictly after
//!   `starts_at`.
//! - Only `cancelled` and `no_show` entries release their slot.
//! - An entry always has at least one assignee.

use super::job_order::JobOrderId;
use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable schedule entry identifier.
pub type ScheduleEntryId = Uuid;

/// Lifecycle state of a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl ScheduleStatus {
    /// Whether an entry in this state still occupies its assignees' time.
    pub fn blocks_slot(self) -> bool {
        !matches!(self, ScheduleStatus::Cancelled | ScheduleStatus::NoShow)
    }

    pub fn can_transition(self, next: ScheduleStatus) -> bool {
        use ScheduleStatus::{Cancelled, Completed, Confirmed, NoShow, Scheduled};
        matches!(
            (self, next),
            (Scheduled, Confirmed) | (Scheduled, Cancelled) | (Scheduled, NoShow)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }
}

/// A calendar record booking one or more employees for an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleEntryId,
    /// Linked job order, when the booking executes ordered work.
    pub job_order_id: Option<JobOrderId>,
    pub title: String,
    pub location: Option<String>,
    /// Epoch milliseconds, inclusive start of the slot.
    pub starts_at: i64,
    /// Epoch milliseconds, exclusive end of the slot.
    pub ends_at: i64,
    pub status: ScheduleStatus,
    pub notes: Option<String>,
}

impl ScheduleEntry {
    pub fn new(title: impl Into<String>, starts_at: i64, ends_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_order_id: None,
            title: title.into(),
            location: None,
            starts_at,
            ends_at,
            status: ScheduleStatus::Scheduled,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if self.ends_at <= self.starts_at {
            return Err(ValidationError::EmptyTimeRange {
                starts_at: self.starts_at,
                ends_at: self.ends_at,
            });
        }
        Ok(())
    }
}

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`.
pub fn intervals_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && a_end > b_start
}
