//! HTTP-agnostic API surface.
//!
//! Handlers take typed requests plus the authenticated caller and return
//! `Result<T, ApiError>`; the transport adapter in `server` does the rest.

pub mod error;
pub mod handlers;
pub mod types;

pub use error::{ApiError, ApiErrorData, ErrorCode};

use serde::Serialize;

/// Uniform response envelope for all endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorData>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(err: &ApiError) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiErrorData::from(err)),
        }
    }
}
