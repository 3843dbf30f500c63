//! Error response envelope: `{ "error": { "code", "message", "details"? } }`

use crate::error::HubError;
use crate::manifest::Violation;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<Violation>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Handler error: a service error, a malformed request, or a response that
/// could not be built.
#[derive(Debug)]
pub enum ApiError {
    Hub(HubError),
    BadRequest(String),
    Internal(String),
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self::Hub(err)
    }
}

fn status_for(err: &HubError) -> StatusCode {
    match err {
        HubError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        HubError::ConcurrentPublish { .. } | HubError::InvalidState(_) => StatusCode::CONFLICT,
        HubError::NotFound(_) | HubError::NoPublishedConfig(_) => StatusCode::NOT_FOUND,
        HubError::PublishFailed { .. } | HubError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn envelope(status: StatusCode, detail: ErrorDetail) -> Response {
    (status, Json(ErrorResponse { error: detail })).into_response()
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let code = self.code();

        let (message, details) = match self {
            Self::Validation(errors) => {
                warn!(violations = errors.len(), "Rejected invalid manifest");
                (
                    format!("manifest has {} violation(s)", errors.len()),
                    Some(errors.violations),
                )
            }
            // Backend detail stays in the logs
            Self::PublishFailed { ref tenant_id, ref source } => {
                error!(tenant_id = %tenant_id, error = %source, "Publish failed on storage");
                ("publish could not be completed, retry later".to_string(), None)
            }
            Self::Storage(ref source) => {
                error!(error = %source, "Storage unavailable");
                ("storage is temporarily unavailable".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        envelope(status, ErrorDetail { code, message, details })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Hub(err) => err.into_response(),
            Self::BadRequest(message) => envelope(
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "bad_request",
                    message,
                    details: None,
                },
            ),
            Self::Internal(message) => {
                error!(error = %message, "Request failed");
                envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetail {
                        code: "internal_error",
                        message: "internal error".to_string(),
                        details: None,
                    },
                )
            }
        }
    }
}
