//! Job order use-case service.
//!
//! # Responsibility
//! - Provide job create/transition/crew/delete APIs.
//! - Enforce the job lifecycle transition table.
//!
//! # Invariants
//! - Jobs created from a quotation require the quotation to be accepted.
//! - Every applied transition appends one status-update row.
//! - Completed and in-progress jobs are never deleted.

use crate::model::job_order::{JobOrder, JobOrderId, JobStatus};
use crate::model::quotation::QuotationStatus;
use crate::model::user::UserId;
use crate::model::ValidationError;
use crate::repo::job_repo::{JobDetail, JobListQuery, JobRepository};
use crate::repo::quotation_repo::QuotationDetail;
use crate::repo::{RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for job order use-cases.
#[derive(Debug)]
pub enum JobServiceError {
    JobNotFound(JobOrderId),
    InvalidTransition { from: JobStatus, to: JobStatus },
    /// Job creation from a quotation that is not accepted.
    QuotationNotAccepted(QuotationStatus),
    /// Deletion blocked by the current status.
    DeleteForbidden(JobStatus),
    Validation(ValidationError),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for JobServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JobNotFound(id) => write!(f, "job order not found: {id}"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "job order cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::QuotationNotAccepted(status) => write!(
                f,
                "job orders require an accepted quotation, got `{}`",
                status.as_str()
            ),
            Self::DeleteForbidden(status) => write!(
                f,
                "job order in status `{}` cannot be deleted",
                status.as_str()
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent job state: {details}"),
        }
    }
}

impl Error for JobServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for JobServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "job order",
                id,
            } => Self::JobNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Job order service facade over repository implementations.
pub struct JobService<R: JobRepository> {
    repo: R,
}

impl<R: JobRepository> JobService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a new job order; status always starts at `pending`.
    pub fn create_job(&mut self, mut job: JobOrder) -> Result<JobDetail, JobServiceError> {
        job.status = JobStatus::Pending;
        job.validate().map_err(JobServiceError::Validation)?;
        Ok(self.repo.create_job(&job)?)
    }

    /// Creates a job order carrying the linkage of an accepted quotation.
    pub fn create_from_quotation(
        &mut self,
        quotation: &QuotationDetail,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<JobDetail, JobServiceError> {
        if quotation.quotation.status != QuotationStatus::Accepted {
            return Err(JobServiceError::QuotationNotAccepted(
                quotation.quotation.status,
            ));
        }

        let mut job = JobOrder::new(quotation.quotation.client_id, title);
        job.site_id = quotation.quotation.site_id;
        job.quotation_id = Some(quotation.quotation.id);
        job.description = description;
        self.create_job(job)
    }

    pub fn update_info(
        &self,
        id: JobOrderId,
        title: &str,
        description: Option<&str>,
    ) -> Result<(), JobServiceError> {
        if title.trim().is_empty() {
            return Err(JobServiceError::Validation(ValidationError::BlankField(
                "title",
            )));
        }
        Ok(self.repo.update_info(id, title, description)?)
    }

    /// Applies a lifecycle move and appends the history row.
    pub fn transition(
        &mut self,
        id: JobOrderId,
        to: JobStatus,
        note: Option<&str>,
        changed_by: UserId,
    ) -> Result<JobDetail, JobServiceError> {
        let detail = self.require_detail(id)?;
        let from = detail.job.status;
        if !from.can_transition(to) {
            return Err(JobServiceError::InvalidTransition { from, to });
        }

        if !self.repo.apply_transition(id, from, to, note, changed_by)? {
            let current = self.require_detail(id)?;
            return Err(JobServiceError::InvalidTransition {
                from: current.job.status,
                to,
            });
        }

        self.require_detail(id)
    }

    /// Replaces the assigned crew as a whole set.
    pub fn replace_crew(
        &mut self,
        id: JobOrderId,
        crew: &[UserId],
    ) -> Result<JobDetail, JobServiceError> {
        self.repo.replace_crew(id, crew)?;
        self.require_detail(id)
    }

    pub fn get_detail(&self, id: JobOrderId) -> RepoResult<Option<JobDetail>> {
        self.repo.get_detail(id)
    }

    pub fn list_jobs(&self, query: &JobListQuery) -> RepoResult<Vec<JobOrder>> {
        self.repo.list_jobs(query)
    }

    /// Deletes a job order unless its status forbids it.
    pub fn delete_job(&mut self, id: JobOrderId) -> Result<(), JobServiceError> {
        if !self.repo.delete_job(id)? {
            let detail = self.require_detail(id)?;
            return Err(JobServiceError::DeleteForbidden(detail.job.status));
        }
        Ok(())
    }

    fn require_detail(&self, id: JobOrderId) -> Result<JobDetail, JobServiceError> {
        self.repo
            .get_detail(id)?
            .ok_or(JobServiceError::JobNotFound(id))
    }
}
