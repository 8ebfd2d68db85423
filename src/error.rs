use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Longest message returned to a caller for an internal failure. The full
/// detail only goes to the log.
const MAX_DETAIL_CHARS: usize = 200;

/// Request-level failures surfaced by the transcription service.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The caller sent something unusable (bad extension, missing file,
    /// malformed form, negative timestamp).
    #[error("{0}")]
    InvalidInput(String),

    /// The request body exceeded the configured upload limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The inference backend is not loaded yet.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Inference or I/O failed on our side.
    #[error("{0}")]
    Internal(String),
}

impl WorkerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller.
    pub fn detail(&self) -> String {
        match self {
            Self::Internal(msg) => truncate_chars(msg, MAX_DETAIL_CHARS),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.detail() });
        (self.status(), Json(body)).into_response()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WorkerError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WorkerError::PayloadTooLarge("x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            WorkerError::ServiceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            WorkerError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_truncated() {
        let long = "é".repeat(500);
        let detail = WorkerError::Internal(long).detail();
        assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS + 3);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn test_short_detail_untouched() {
        let detail = WorkerError::Internal("Transcription failed: boom".into()).detail();
        assert_eq!(detail, "Transcription failed: boom");
    }

    #[test]
    fn test_invalid_input_detail_not_truncated() {
        let msg = "a".repeat(300);
        let detail = WorkerError::InvalidInput(msg.clone()).detail();
        assert_eq!(detail, msg);
    }
}
