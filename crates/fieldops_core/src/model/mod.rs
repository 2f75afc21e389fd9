//! Domain model for field-service business documents.
//!
//! # Responsibility
//! - Define the canonical records used by core business logic.
//! - Own field-level validation and status transition tables.
//!
//! # Invariants
//! - Every aggregate is identified by a stable UUID.
//! - Status enums persist as snake_case strings.
//! - Money is integer cents; timestamps are Unix epoch milliseconds.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod client;
pub mod invoice;
pub mod job_order;
pub mod lead;
pub mod line_item;
pub mod quotation;
pub mod schedule;
pub mod user;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("valid phone regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._\-]{2,31}$").expect("valid username regex"));

/// Field-level validation failure shared by all domain records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Email does not look like `local@domain.tld`.
    InvalidEmail(String),
    /// Phone contains characters outside the accepted dial set.
    InvalidPhone(String),
    /// Username violates the `[a-z0-9._-]` / length contract.
    InvalidUsername(String),
    /// Lead carries neither email nor phone.
    MissingContact,
    /// `ends_at` is not strictly after `starts_at`.
    EmptyTimeRange { starts_at: i64, ends_at: i64 },
    /// Line item quantity must be >= 1.
    NonPositiveQuantity(i64),
    /// Line item unit price must not be negative.
    NegativeUnitPrice(i64),
    /// Payment amount must be > 0.
    NonPositiveAmount(i64),
    /// Schedule entries require at least one assignee.
    NoAssignees,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "field `{field}` must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email: `{value}`"),
            Self::InvalidPhone(value) => write!(f, "invalid phone: `{value}`"),
            Self::InvalidUsername(value) => write!(f, "invalid username: `{value}`"),
            Self::MissingContact => write!(f, "at least one of email or phone is required"),
            Self::EmptyTimeRange { starts_at, ends_at } => write!(
                f,
                "time range is empty or inverted: starts_at={starts_at} ends_at={ends_at}"
            ),
            Self::NonPositiveQuantity(value) => {
                write!(f, "quantity must be at least 1, got {value}")
            }
            Self::NegativeUnitPrice(value) => {
                write!(f, "unit price must not be negative, got {value}")
            }
            Self::NonPositiveAmount(value) => {
                write!(f, "amount must be positive, got {value}")
            }
            Self::NoAssignees => write!(f, "at least one assignee is required"),
        }
    }
}

impl Error for ValidationError {}

/// Checks a required text field for non-blank content.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::BlankField(field))
    } else {
        Ok(())
    }
}

/// Validates an optional email against the shape contract.
pub(crate) fn check_email(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(email) if !EMAIL_RE.is_match(email.trim()) => {
            Err(ValidationError::InvalidEmail(email.to_string()))
        }
        _ => Ok(()),
    }
}

/// Validates an optional phone number against the dial-set contract.
pub(crate) fn check_phone(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(phone) if !PHONE_RE.is_match(phone.trim()) => {
            Err(ValidationError::InvalidPhone(phone.to_string()))
        }
        _ => Ok(()),
    }
}

pub(crate) fn check_username(value: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidUsername(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{check_email, check_phone, check_username};

    #[test]
    fn email_shape_is_enforced_only_when_present() {
        assert!(check_email(None).is_ok());
        assert!(check_email(Some("ops@example.com")).is_ok());
        assert!(check_email(Some("not-an-email")).is_err());
        assert!(check_email(Some("two words@example.com")).is_err());
    }

    #[test]
    fn phone_accepts_international_and_local_forms() {
        assert!(check_phone(Some("+31 20 123 4567")).is_ok());
        assert!(check_phone(Some("(020) 123-4567")).is_err()); // must start with digit or +
        assert!(check_phone(Some("0201234567")).is_ok());
        assert!(check_phone(Some("call me")).is_err());
    }

    #[test]
    fn usernames_are_lowercase_and_bounded() {
        assert!(check_username("j.doe").is_ok());
        assert!(check_username("J.Doe").is_err());
        assert!(check_username("ab").is_err());
    }
}
