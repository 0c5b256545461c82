//! Error types for the relay.

use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Network, auth or DNS failure; the service could not be reached.
    Unavailable,
    /// The call exceeded its fixed timeout.
    Timeout,
    /// The service answered with a non-2xx status.
    BadStatus(u16),
    /// The service answered 2xx but the body did not have the expected shape.
    Malformed,
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamErrorKind::Unavailable => write!(f, "unavailable"),
            UpstreamErrorKind::Timeout => write!(f, "timeout"),
            UpstreamErrorKind::BadStatus(code) => write!(f, "bad status {}", code),
            UpstreamErrorKind::Malformed => write!(f, "malformed response"),
        }
    }
}

/// Uniform failure signal from the knowledge-base, completion and push adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, message)
    }

    pub fn bad_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::BadStatus(status), message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Malformed, message)
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::malformed(err.to_string())
    }
}

/// Request-level error taxonomy surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream response malformed: {0}")]
    UpstreamMalformed(String),

    #[error("Invalid or expired push token: {0}")]
    InvalidToken(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("Push delivery failed: {0}")]
    Delivery(String),

    #[error("Push notifications are not configured")]
    NotificationsDisabled,

    #[error("{0}")]
    Unhandled(String),
}

impl RelayError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        RelayError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::UpstreamUnavailable(_) => "upstream_unavailable",
            RelayError::UpstreamMalformed(_) => "upstream_malformed",
            RelayError::InvalidToken(_) => "invalid_token",
            RelayError::Validation { .. } => "validation_error",
            RelayError::Delivery(_) => "delivery_error",
            RelayError::NotificationsDisabled => "notifications_disabled",
            RelayError::Unhandled(_) => "internal_error",
        }
    }
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        match err.kind {
            UpstreamErrorKind::Malformed => RelayError::UpstreamMalformed(err.message),
            _ => RelayError::UpstreamUnavailable(err.to_string()),
        }
    }
}
