//! Response types for the workforce sync API.
//!
//! This module defines the error response structures and the mapping from
//! engine errors to HTTP status codes.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::EngineError;
use crate::store::IdentityError;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(self.error),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::ConfigNotFound { path } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration error",
                    format!("Configuration file not found: {}", path),
                ),
            ),
            EngineError::ConfigParseError { path, message } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration parse error",
                    format!("Failed to parse {}: {}", path, message),
                ),
            ),
            EngineError::UnmappedRequiredFields { fields, .. } => ApiErrorResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::with_details(
                    "UNMAPPED_REQUIRED_FIELDS",
                    message,
                    format!("Map a column to: {}", fields.join(", ")),
                ),
            ),
            EngineError::ImportBlocked { .. } => ApiErrorResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::with_details(
                    "IMPORT_BLOCKED",
                    message,
                    "Fix the critical violations and upload the file again",
                ),
            ),
            EngineError::ForceRequired { .. } => ApiErrorResponse::new(
                StatusCode::CONFLICT,
                ApiError::with_details(
                    "FORCE_REQUIRED",
                    message,
                    "Confirm with force_non_critical to import with the offending fields nulled",
                ),
            ),
            EngineError::Identity(IdentityError::Conflict(conflict)) => ApiErrorResponse::new(
                StatusCode::CONFLICT,
                ApiError::with_details("IDENTITY_CONFLICT", message, conflict.identifier),
            ),
            EngineError::Identity(_) => {
                ApiErrorResponse::new(StatusCode::BAD_REQUEST, ApiError::new("IDENTITY_ERROR", message))
            }
            EngineError::InvalidSyncRequest { .. } => ApiErrorResponse::new(
                StatusCode::BAD_REQUEST,
                ApiError::new("INVALID_SYNC_REQUEST", message),
            ),
            EngineError::InvalidPeriod { .. } => ApiErrorResponse::new(
                StatusCode::BAD_REQUEST,
                ApiError::new("INVALID_PERIOD", message),
            ),
            EngineError::InvalidAlertRule { .. } => ApiErrorResponse::new(
                StatusCode::BAD_REQUEST,
                ApiError::new("INVALID_ALERT_RULE", message),
            ),
            EngineError::JobNotFound { .. } => {
                ApiErrorResponse::new(StatusCode::NOT_FOUND, ApiError::new("JOB_NOT_FOUND", message))
            }
            EngineError::IssueNotFound { .. } => {
                ApiErrorResponse::new(StatusCode::NOT_FOUND, ApiError::new("ISSUE_NOT_FOUND", message))
            }
            EngineError::ProfileNotFound { .. } => ApiErrorResponse::new(
                StatusCode::NOT_FOUND,
                ApiError::new("PROFILE_NOT_FOUND", message),
            ),
            EngineError::AlertRuleNotFound { .. } => ApiErrorResponse::new(
                StatusCode::NOT_FOUND,
                ApiError::new("ALERT_RULE_NOT_FOUND", message),
            ),
            EngineError::NotificationNotFound { .. } => ApiErrorResponse::new(
                StatusCode::NOT_FOUND,
                ApiError::new("NOTIFICATION_NOT_FOUND", message),
            ),
            EngineError::JobAlreadyFinalized { .. } => ApiErrorResponse::new(
                StatusCode::CONFLICT,
                ApiError::new("JOB_ALREADY_FINALIZED", message),
            ),
            EngineError::IssueAlreadyResolved { .. } => ApiErrorResponse::new(
                StatusCode::CONFLICT,
                ApiError::new("ISSUE_ALREADY_RESOLVED", message),
            ),
            EngineError::ExportError { message } => ApiErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details("EXPORT_ERROR", "Export failed", message),
            ),
        }
    }
}

impl From<JsonRejection> for ApiErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        let error = match rejection {
            JsonRejection::JsonDataError(err) => {
                let body_text = err.body_text();
                warn!(error = %body_text, "JSON data error");
                if body_text.contains("missing field") {
                    ApiError::validation_error(body_text)
                } else {
                    ApiError::malformed_json(body_text)
                }
            }
            JsonRejection::JsonSyntaxError(err) => {
                warn!(error = %err, "JSON syntax error");
                ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
            }
            _ => ApiError::malformed_json("Failed to parse request body"),
        };
        ApiErrorResponse::new(StatusCode::BAD_REQUEST, error)
    }
}

impl From<QueryRejection> for ApiErrorResponse {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection.body_text(), "Query string rejected");
        ApiErrorResponse::new(
            StatusCode::BAD_REQUEST,
            ApiError::validation_error(rejection.body_text()),
        )
    }
}

impl From<PathRejection> for ApiErrorResponse {
    fn from(rejection: PathRejection) -> Self {
        warn!(error = %rejection.body_text(), "Path parameters rejected");
        ApiErrorResponse::new(
            StatusCode::BAD_REQUEST,
            ApiError::validation_error(rejection.body_text()),
        )
    }
}
