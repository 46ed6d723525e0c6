//! Error types surfaced to callers of the catalog client.
//!
//! Every request resolves to an [`ApiResponse`], which is either the payload
//! or an [`ApiError`] tagged with an [`ErrorKind`]. The orchestration layer
//! never invents new kinds: it forwards what the repositories report and
//! injects [`ErrorKind::Cancelled`] when cancellation wins the race against
//! completion.

use std::fmt;

use thiserror::Error;

/// Result type for every catalog request.
pub type ApiResponse<T> = Result<T, ApiError>;

/// Classification of a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure forwarded from the network collaborator.
    NetworkError,
    /// The requested resource does not exist (or is not cached for `CacheOnly`).
    NotFound,
    /// A payload could not be decoded.
    DeserializationError,
    /// The request was cancelled before or during execution.
    Cancelled,
    /// The request itself is malformed.
    InvalidRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NetworkError => "network error",
            ErrorKind::NotFound => "not found",
            ErrorKind::DeserializationError => "deserialization error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidRequest => "invalid request",
        };
        f.write_str(name)
    }
}

/// A structured request failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    http_status: Option<u16>,
}

impl ApiError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
        }
    }

    /// The error reported when cancellation wins over completion.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Operation cancelled")
    }

    /// Creates a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a `NetworkError`.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    /// Creates an `InvalidRequest` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Creates a `DeserializationError`.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeserializationError, message)
    }

    /// Attaches the HTTP status code that produced this error.
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the error came from an HTTP response.
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Returns true if this error marks a cancelled request.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error() {
        let err = ApiError::cancelled();
        assert!(err.is_cancelled());
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::not_found("partition 23618402 missing");
        assert_eq!(err.to_string(), "not found: partition 23618402 missing");
    }

    #[test]
    fn test_error_with_http_status() {
        let err = ApiError::network("HTTP 503").with_http_status(503);
        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert_eq!(err.http_status(), Some(503));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ApiError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }
}
