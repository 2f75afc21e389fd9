//! API error type with HTTP status mapping.
//!
//! Every core service error converges here; the conversions decide which
//! failures are the caller's fault (400/404/409) and which are ours (500).

use fieldops_core::{
    InvoiceServiceError, JobServiceError, LeadServiceError, QuotationServiceError, RepoError,
    ScheduleConflict, ScheduleServiceError, UserServiceError,
};
use serde::Serialize;

/// Error codes that map to HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid request payload or parameters (400).
    BadRequest,
    /// Missing or invalid session (401).
    Unauthorized,
    /// Valid session, insufficient role (403).
    Forbidden,
    /// Resource not found (404).
    NotFound,
    /// Business rule conflict: double booking, illegal transition,
    /// overpayment, duplicate username (409).
    Conflict,
    /// Internal or storage error (500).
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// API error with code and message.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::BadRequest,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Unauthorized,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Forbidden,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Conflict,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: message.into(),
        }
    }

    /// Builds the 409 for a rejected double booking, naming the
    /// conflicting entry ids.
    #[must_use]
    pub fn schedule_conflict(conflicts: &[ScheduleConflict]) -> Self {
        let ids: Vec<String> = conflicts
            .iter()
            .map(|conflict| conflict.entry_id.to_string())
            .collect();
        Self::conflict(format!(
            "slot conflicts with existing entries: {}",
            ids.join(", ")
        ))
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

/// Serializable error body for JSON responses.
#[derive(Debug, Serialize)]
pub struct ApiErrorData {
    pub code: String,
    pub message: String,
}

impl From<&ApiError> for ApiErrorData {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::bad_request(err.to_string()),
            RepoError::NotFound { .. } => Self::not_found(value.to_string()),
            RepoError::Constraint(message) => Self::conflict(message),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<LeadServiceError> for ApiError {
    fn from(value: LeadServiceError) -> Self {
        match value {
            LeadServiceError::LeadNotFound(_) => Self::not_found(value.to_string()),
            LeadServiceError::InvalidTransition { .. } | LeadServiceError::NotConvertible(_) => {
                Self::conflict(value.to_string())
            }
            LeadServiceError::Validation(_) => Self::bad_request(value.to_string()),
            LeadServiceError::Repo(err) => err.into(),
            LeadServiceError::InconsistentState(_) => Self::internal(value.to_string()),
        }
    }
}

impl From<QuotationServiceError> for ApiError {
    fn from(value: QuotationServiceError) -> Self {
        match value {
            QuotationServiceError::QuotationNotFound(_) => Self::not_found(value.to_string()),
            QuotationServiceError::InvalidTransition { .. }
            | QuotationServiceError::NotDraft(_)
            | QuotationServiceError::NoItems(_) => Self::conflict(value.to_string()),
            QuotationServiceError::Validation(_) => Self::bad_request(value.to_string()),
            QuotationServiceError::Repo(err) => err.into(),
            QuotationServiceError::InconsistentState(_) => Self::internal(value.to_string()),
        }
    }
}

impl From<JobServiceError> for ApiError {
    fn from(value: JobServiceError) -> Self {
        match value {
            JobServiceError::JobNotFound(_) => Self::not_found(value.to_string()),
            JobServiceError::InvalidTransition { .. }
            | JobServiceError::QuotationNotAccepted(_)
            | JobServiceError::DeleteForbidden(_) => Self::conflict(value.to_string()),
            JobServiceError::Validation(_) => Self::bad_request(value.to_string()),
            JobServiceError::Repo(err) => err.into(),
            JobServiceError::InconsistentState(_) => Self::internal(value.to_string()),
        }
    }
}

impl From<InvoiceServiceError> for ApiError {
    fn from(value: InvoiceServiceError) -> Self {
        match value {
            InvoiceServiceError::InvoiceNotFound(_) => Self::not_found(value.to_string()),
            InvoiceServiceError::ItemsLocked(_)
            | InvoiceServiceError::NoItems(_)
            | InvoiceServiceError::JobNotCompleted(_)
            | InvoiceServiceError::PaymentNotAllowed(_)
            | InvoiceServiceError::Overpayment { .. }
            | InvoiceServiceError::VoidWithPayments(_)
            | InvoiceServiceError::VoidNotAllowed(_)
            | InvoiceServiceError::StaleStatus(_) => Self::conflict(value.to_string()),
            InvoiceServiceError::Validation(_) => Self::bad_request(value.to_string()),
            InvoiceServiceError::Repo(err) => match err {
                fieldops_core::InvoiceRepoError::LinkedDocumentMismatch(message) => {
                    Self::conflict(message)
                }
                other => Self::internal(other.to_string()),
            },
        }
    }
}

impl From<ScheduleServiceError> for ApiError {
    fn from(value: ScheduleServiceError) -> Self {
        match value {
            ScheduleServiceError::EntryNotFound(_) => Self::not_found(value.to_string()),
            ScheduleServiceError::Conflict(conflicts) => Self::schedule_conflict(&conflicts),
            ScheduleServiceError::InvalidTransition { .. } => Self::conflict(value.to_string()),
            ScheduleServiceError::InvalidWindow { .. } | ScheduleServiceError::Validation(_) => {
                Self::bad_request(value.to_string())
            }
            ScheduleServiceError::Repo(err) => match err {
                fieldops_core::ScheduleRepoError::JobNotFound(_) => {
                    Self::not_found(err.to_string())
                }
                fieldops_core::ScheduleRepoError::AssigneeRejected(_) => {
                    Self::conflict(err.to_string())
                }
                other => Self::internal(other.to_string()),
            },
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(value: UserServiceError) -> Self {
        match value {
            UserServiceError::UserNotFound(_) => Self::not_found(value.to_string()),
            UserServiceError::UsernameTaken(_) => Self::conflict(value.to_string()),
            UserServiceError::Validation(_) => Self::bad_request(value.to_string()),
            UserServiceError::Repo(err) => err.into(),
            UserServiceError::InconsistentState(_) => Self::internal(value.to_string()),
        }
    }
}
