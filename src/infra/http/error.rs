use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::{convert::validate::InvalidPayload, error::ConvertError};

/// Maximum number of characters of engine stderr surfaced to callers.
const STDERR_EXCERPT_MAX: usize = 240;

/// Wire shape of every error response: `{"error": <message>}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Diagnostic payload attached to error responses so the logging
/// middleware can emit the full cause chain without leaking it to callers.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// A classified conversion failure translated for the HTTP surface.
#[derive(Debug)]
pub struct ConvertHttpError {
    status: StatusCode,
    message: String,
    report: ErrorReport,
}

impl ConvertHttpError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let report = ErrorReport::from_message(source, status, message.clone());
        Self {
            status,
            message,
            report,
        }
    }

    pub fn payload_too_large(limit_bytes: u64) -> Self {
        Self::new(
            "infra::http::convert",
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "File too large. Maximum size is {}MB",
                limit_bytes / (1024 * 1024)
            ),
        )
    }
}

impl From<ConvertError> for ConvertHttpError {
    fn from(error: ConvertError) -> Self {
        let source = "infra::http::convert";
        let (status, message) = match &error {
            ConvertError::PayloadTooLarge { limit, .. } => {
                return {
                    let mut http = ConvertHttpError::payload_too_large(*limit);
                    http.report =
                        ErrorReport::from_error(source, StatusCode::PAYLOAD_TOO_LARGE, &error);
                    http
                };
            }
            ConvertError::InvalidInput(InvalidPayload::Empty) => {
                (StatusCode::BAD_REQUEST, "Empty request body".to_string())
            }
            ConvertError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, "Invalid HTML content".to_string())
            }
            ConvertError::Workspace(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to prepare conversion workspace".to_string(),
            ),
            ConvertError::Spawn(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PDF rendering engine is not available".to_string(),
            ),
            ConvertError::EngineExit { stderr, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Conversion failed: {}", sanitize_excerpt(stderr)),
            ),
            ConvertError::EmptyOutput => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PDF file was not created or is empty".to_string(),
            ),
            ConvertError::Timeout { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PDF conversion timed out".to_string(),
            ),
        };

        let report = ErrorReport::from_error(source, status, &error);
        Self {
            status,
            message,
            report,
        }
    }
}

impl IntoResponse for ConvertHttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Collapse whitespace, drop control characters, and bound the length of
/// an engine diagnostic before it is shown to a caller.
pub fn sanitize_excerpt(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= STDERR_EXCERPT_MAX {
        return collapsed;
    }
    let mut excerpt: String = collapsed.chars().take(STDERR_EXCERPT_MAX).collect();
    excerpt.push_str("...");
    excerpt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_collapses_newlines_and_bounds_length() {
        let raw = "prince: error\nline two\tdetail";
        assert_eq!(sanitize_excerpt(raw), "prince: error line two detail");

        let long = "x".repeat(1000);
        let excerpt = sanitize_excerpt(&long);
        assert_eq!(excerpt.chars().count(), STDERR_EXCERPT_MAX + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn payload_limit_message_reports_megabytes() {
        let err = ConvertHttpError::payload_too_large(16 * 1024 * 1024);
        assert_eq!(err.message, "File too large. Maximum size is 16MB");
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn timeout_maps_to_internal_error_without_leaking_paths() {
        let err = ConvertHttpError::from(ConvertError::Timeout {
            limit: std::time::Duration::from_secs(30),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "PDF conversion timed out");
    }
}
