//! Error types for media generation.

use std::time::Duration;

/// Errors that can occur while generating or assembling media.
#[derive(Debug, thiserror::Error)]
pub enum GenReelError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// A long-running job did not finish within the poll policy.
    #[error("operation {operation} timed out after {elapsed:?} ({polls} polls)")]
    Timeout {
        operation: String,
        elapsed: Duration,
        polls: u32,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to write a WAV container.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// The service answered, but not with what we asked for.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A video job reached its failed terminal state.
    #[error("video generation failed: {0}")]
    VideoGeneration(String),

    /// Audio/video merge failed and the caller asked for a hard error.
    #[error("merge failed: {0}")]
    Merge(String),
}

impl GenReelError {
    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout { .. } => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

/// Result type alias for media generation operations.
pub type Result<T> = std::result::Result<T, GenReelError>;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Reduces an error body to something fit for a log line.
///
/// Google APIs wrap errors as `{"error": {"message": ...}}`; when that shape is
/// present only the message is kept. Anything else is truncated.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string());

    if extracted.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = extracted.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        extracted
    }
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(GenReelError::RateLimited { retry_after: None }.is_retryable());
        assert!(GenReelError::Timeout {
            operation: "operations/1".into(),
            elapsed: Duration::from_secs(30),
            polls: 3,
        }
        .is_retryable());

        assert!(!GenReelError::Auth("bad key".into()).is_retryable());
        assert!(!GenReelError::ContentBlocked("nsfw".into()).is_retryable());
        assert!(!GenReelError::VideoGeneration("failed".into()).is_retryable());
        assert!(!GenReelError::Decode("bad base64".into()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let rate_limited = GenReelError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

        let rate_limited_no_hint = GenReelError::RateLimited { retry_after: None };
        assert_eq!(rate_limited_no_hint.retry_after(), None);

        let auth = GenReelError::Auth("bad".into());
        assert_eq!(auth.retry_after(), None);
    }

    #[test]
    fn test_error_display() {
        let err = GenReelError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = GenReelError::Timeout {
            operation: "operations/abc".into(),
            elapsed: Duration::from_secs(20),
            polls: 2,
        };
        assert_eq!(
            err.to_string(),
            "operation operations/abc timed out after 20s (2 polls)"
        );
    }

    #[test]
    fn test_sanitize_extracts_google_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(sanitize_error_message(body), "API key not valid");
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let sanitized = sanitize_error_message(&body);
        assert!(sanitized.ends_with("..."));
        assert_eq!(sanitized.len(), MAX_ERROR_MESSAGE_LEN + 3);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(reqwest::header::RETRY_AFTER, "42".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(42));
    }
}
