//! Pure API handlers.
//!
//! Handlers contain request-level orchestration only: parse identifiers,
//! construct the repository/service for the call, translate errors. All
//! business rules live in `fieldops_core`.

use super::error::ApiError;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod clients;
pub mod invoices;
pub mod jobs;
pub mod leads;
pub mod quotations;
pub mod schedule;
pub mod session;
pub mod users;

/// Decoded query-string parameters.
pub type QueryMap = HashMap<String, String>;

/// Parses a path segment as a UUID.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid id: `{raw}`")))
}

pub(crate) fn q_bool(query: &QueryMap, key: &str) -> Result<bool, ApiError> {
    match query.get(key).map(String::as_str) {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ApiError::bad_request(format!(
            "invalid boolean for `{key}`: `{other}`"
        ))),
    }
}

pub(crate) fn q_u32(query: &QueryMap, key: &str) -> Result<Option<u32>, ApiError> {
    match query.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid number for `{key}`: `{raw}`"))),
    }
}

pub(crate) fn q_i64(query: &QueryMap, key: &str) -> Result<Option<i64>, ApiError> {
    match query.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid number for `{key}`: `{raw}`"))),
    }
}

pub(crate) fn q_uuid(query: &QueryMap, key: &str) -> Result<Option<Uuid>, ApiError> {
    match query.get(key) {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid id for `{key}`: `{raw}`"))),
    }
}

/// Parses an optional status-like query value via the given parser.
pub(crate) fn q_parsed<T>(
    query: &QueryMap,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ApiError> {
    match query.get(key) {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("invalid value for `{key}`: `{raw}`"))),
    }
}

/// Server clock in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
