//! Schedule use-case service.
//!
//! # Responsibility
//! - Provide booking create/reschedule/assignee/status APIs.
//! - Own the conflict policy: reject by default, create-and-warn when the
//!   caller explicitly allows conflicts.
//!
//! # Invariants
//! - New entries always start in `scheduled`.
//! - Conflict detection runs inside the repository transaction that
//!   performs the write; the service only decides what to do with the
//!   outcome.

use crate::model::schedule::{ScheduleEntry, ScheduleEntryId, ScheduleStatus};
use crate::model::user::UserId;
use crate::model::ValidationError;
use crate::repo::schedule_repo::{
    ScheduleConflict, ScheduleEntryDetail, ScheduleRepoError, ScheduleRepository,
    ScheduleWindowQuery,
};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for schedule use-cases.
#[derive(Debug)]
pub enum ScheduleServiceError {
    EntryNotFound(ScheduleEntryId),
    InvalidTransition {
        from: ScheduleStatus,
        to: ScheduleStatus,
    },
    /// The requested slot overlaps existing bookings.
    Conflict(Vec<ScheduleConflict>),
    /// Window queries require `from < to`.
    InvalidWindow { from: i64, to: i64 },
    Validation(ValidationError),
    Repo(ScheduleRepoError),
}

impl Display for ScheduleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryNotFound(id) => write!(f, "schedule entry not found: {id}"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "schedule entry cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::Conflict(conflicts) => write!(
                f,
                "slot conflicts with {} existing booking(s)",
                conflicts.len()
            ),
            Self::InvalidWindow { from, to } => {
                write!(f, "invalid window: from={from} to={to}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScheduleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScheduleRepoError> for ScheduleServiceError {
    fn from(value: ScheduleRepoError) -> Self {
        match value {
            ScheduleRepoError::EntryNotFound(id) => Self::EntryNotFound(id),
            ScheduleRepoError::Conflict(conflicts) => Self::Conflict(conflicts),
            ScheduleRepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// A booking returned together with the conflicts it was allowed to
/// override (empty on a clean slot).
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub detail: ScheduleEntryDetail,
    pub overridden_conflicts: Vec<ScheduleConflict>,
}

/// Schedule service facade over repository implementations.
pub struct ScheduleService<R: ScheduleRepository> {
    repo: R,
}

impl<R: ScheduleRepository> ScheduleService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Books a new entry.
    ///
    /// Conflicting slots are rejected unless `allow_conflicts` is set, in
    /// which case the entry is created and the override is logged.
    pub fn create_entry(
        &mut self,
        mut entry: ScheduleEntry,
        assignees: &[UserId],
        allow_conflicts: bool,
        actor: UserId,
    ) -> Result<BookingOutcome, ScheduleServiceError> {
        entry.status = ScheduleStatus::Scheduled;
        entry.validate().map_err(ScheduleServiceError::Validation)?;

        let conflicts = self
            .repo
            .create_entry(&entry, assignees, allow_conflicts, actor)?;
        if !conflicts.is_empty() {
            warn!(
                "event=schedule_conflict_override module=schedule status=ok entry={} conflicts={}",
                entry.id,
                conflicts.len()
            );
        }

        let detail = self.require_detail(entry.id)?;
        Ok(BookingOutcome {
            detail,
            overridden_conflicts: conflicts,
        })
    }

    pub fn get_detail(
        &self,
        id: ScheduleEntryId,
    ) -> Result<Option<ScheduleEntryDetail>, ScheduleServiceError> {
        Ok(self.repo.get_detail(id)?)
    }

    /// Lists bookings overlapping a time window.
    pub fn list_window(
        &self,
        query: &ScheduleWindowQuery,
    ) -> Result<Vec<ScheduleEntryDetail>, ScheduleServiceError> {
        if query.from >= query.to {
            return Err(ScheduleServiceError::InvalidWindow {
                from: query.from,
                to: query.to,
            });
        }
        Ok(self.repo.list_window(query)?)
    }

    /// Applies a lifecycle move.
    pub fn transition(
        &mut self,
        id: ScheduleEntryId,
        to: ScheduleStatus,
    ) -> Result<ScheduleEntryDetail, ScheduleServiceError> {
        let detail = self.require_detail(id)?;
        let from = detail.entry.status;
        if !from.can_transition(to) {
            return Err(ScheduleServiceError::InvalidTransition { from, to });
        }

        if !self.repo.apply_status(id, from, to)? {
            let current = self.require_detail(id)?;
            return Err(ScheduleServiceError::InvalidTransition {
                from: current.entry.status,
                to,
            });
        }

        self.require_detail(id)
    }

    /// Cancels the entry, releasing its slot.
    pub fn cancel(
        &mut self,
        id: ScheduleEntryId,
    ) -> Result<ScheduleEntryDetail, ScheduleServiceError> {
        self.transition(id, ScheduleStatus::Cancelled)
    }

    /// Moves the slot; conflicts are re-checked against the new window.
    pub fn reschedule(
        &mut self,
        id: ScheduleEntryId,
        starts_at: i64,
        ends_at: i64,
        allow_conflicts: bool,
    ) -> Result<BookingOutcome, ScheduleServiceError> {
        let conflicts = self
            .repo
            .reschedule(id, starts_at, ends_at, allow_conflicts)?;
        if !conflicts.is_empty() {
            warn!(
                "event=schedule_conflict_override module=schedule status=ok entry={id} conflicts={}",
                conflicts.len()
            );
        }

        let detail = self.require_detail(id)?;
        Ok(BookingOutcome {
            detail,
            overridden_conflicts: conflicts,
        })
    }

    /// Replaces the assignee set; conflicts are re-checked for the new
    /// crew.
    pub fn replace_assignees(
        &mut self,
        id: ScheduleEntryId,
        assignees: &[UserId],
        allow_conflicts: bool,
    ) -> Result<BookingOutcome, ScheduleServiceError> {
        let conflicts = self
            .repo
            .replace_assignees(id, assignees, allow_conflicts)?;
        if !conflicts.is_empty() {
            warn!(
                "event=schedule_conflict_override module=schedule status=ok entry={id} conflicts={}",
                conflicts.len()
            );
        }

        let detail = self.require_detail(id)?;
        Ok(BookingOutcome {
            detail,
            overridden_conflicts: conflicts,
        })
    }

    fn require_detail(
        &self,
        id: ScheduleEntryId,
    ) -> Result<ScheduleEntryDetail, ScheduleServiceError> {
        self.repo
            .get_detail(id)?
            .ok_or(ScheduleServiceError::EntryNotFound(id))
    }
}
