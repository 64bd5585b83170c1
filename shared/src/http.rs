//! HTTP helpers for the API handlers.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::Error;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            kind: None,
            details: None,
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(data)).into_response()
}

/// Create an error response with the given status code and message.
pub fn error_response(status: u16, message: impl Into<String>) -> Response {
    json_response(status, &ApiResponse::<()>::error(message))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status >= 500 {
            error!(kind = self.kind(), error = %self, "Request failed");
        }

        let details = match &self {
            Error::Validation { details, .. } if !details.is_empty() => Some(details.clone()),
            _ => None,
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.public_message()),
            kind: Some(self.kind()),
            details,
        };
        json_response(status, &body)
    }
}
