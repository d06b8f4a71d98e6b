//! Error types for the ISAPI client

use thiserror::Error;

/// Errors that can occur while talking to a camera
#[derive(Debug, Error)]
pub enum IsapiError {
    /// The configured address cannot be turned into a base URL
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// The camera answered with a non-success status
    #[error("Device responded with HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    /// Connection or protocol failure before a response arrived
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl IsapiError {
    /// True for 401/403, i.e. wrong credentials or a locked account
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, IsapiError::Status { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for IsapiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IsapiError::Timeout(e.to_string())
        } else {
            IsapiError::Network(e.to_string())
        }
    }
}
