//! Custom error types for the common library
//!
//! Every failure of an outbound call to the identity provider or the calendar
//! API is expressed as an [`UpstreamError`], so the web layer can tell a
//! network failure apart from an error answer of the remote service.

use thiserror::Error;

/// Error raised by a call to a remote service
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The request never produced a response (DNS, connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service answered with a non-success status
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The remote service answered with a success status but an unreadable body
    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Short tag naming the variant
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Network(_) => "network",
            UpstreamError::Upstream { .. } => "upstream",
            UpstreamError::Malformed(_) => "malformed",
        }
    }

    /// HTTP status returned by the remote service, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw content describing the failure
    pub fn body(&self) -> &str {
        match self {
            UpstreamError::Network(message) | UpstreamError::Malformed(message) => message,
            UpstreamError::Upstream { body, .. } => body,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

/// Type alias for Result with UpstreamError
pub type UpstreamResult<T> = Result<T, UpstreamError>;
