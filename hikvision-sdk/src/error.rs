//! Error types for the hikvision-sdk crate.

use isapi_client::IsapiError;

/// Errors from opening the alert stream.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The camera answered the handshake with a non-success status
    #[error("Alert stream rejected with HTTP {status} {reason}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Reason phrase
        reason: String,
    },

    /// No response could be obtained
    #[error("Camera unreachable: {0}")]
    Unreachable(String),

    /// The configured address is unusable
    #[error("Invalid camera address: {0}")]
    InvalidAddress(String),
}

impl ConnectionError {
    /// Fatal errors need a configuration change; the heartbeat does not retry them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectionError::Rejected { .. } | ConnectionError::InvalidAddress(_)
        )
    }
}

impl From<IsapiError> for ConnectionError {
    fn from(e: IsapiError) -> Self {
        let auth_failure = e.is_auth_failure();
        match e {
            IsapiError::Status { status, reason } if auth_failure => ConnectionError::Rejected {
                status,
                reason: format!("{reason} (check username and password)"),
            },
            IsapiError::Status { status, reason } => ConnectionError::Rejected { status, reason },
            IsapiError::InvalidAddress(address) => ConnectionError::InvalidAddress(address),
            IsapiError::Network(msg) | IsapiError::Timeout(msg) => ConnectionError::Unreachable(msg),
        }
    }
}

/// Errors from fetching a snapshot. Never fatal; the host sees an empty image.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotFetchError {
    /// The camera answered with a non-success status
    #[error("Snapshot request returned HTTP {status} {reason}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Reason phrase
        reason: String,
    },

    /// Transport failure
    #[error("Snapshot request failed: {0}")]
    Http(String),
}

impl From<IsapiError> for SnapshotFetchError {
    fn from(e: IsapiError) -> Self {
        match e {
            IsapiError::Status { status, reason } => SnapshotFetchError::Status { status, reason },
            other => SnapshotFetchError::Http(other.to_string()),
        }
    }
}

/// Top-level error for host-facing operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The alert stream could not be opened
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The HTTP client could not be built
    #[error("ISAPI client error: {0}")]
    Client(#[from] IsapiError),

    /// A configuration file could not be read or parsed
    #[error("Failed to load configuration from {path}: {reason}")]
    ConfigFile {
        /// File that failed to load
        path: String,
        /// Underlying error
        reason: String,
    },
}

/// Convenience type alias for Results using SdkError.
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_classification() {
        let rejected: ConnectionError = IsapiError::Status {
            status: 401,
            reason: "Unauthorized".to_string(),
        }
        .into();
        assert!(rejected.is_fatal());
        assert_eq!(
            rejected.to_string(),
            "Alert stream rejected with HTTP 401 Unauthorized (check username and password)"
        );

        let unavailable: ConnectionError = IsapiError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
        }
        .into();
        assert_eq!(
            unavailable.to_string(),
            "Alert stream rejected with HTTP 503 Service Unavailable"
        );

        let unreachable: ConnectionError = IsapiError::Network("connection refused".to_string()).into();
        assert!(!unreachable.is_fatal());
        assert_eq!(unreachable.to_string(), "Camera unreachable: connection refused");

        let timeout: ConnectionError = IsapiError::Timeout("connect".to_string()).into();
        assert!(matches!(timeout, ConnectionError::Unreachable(_)));

        let invalid: ConnectionError = IsapiError::InvalidAddress("ftp://x".to_string()).into();
        assert!(invalid.is_fatal());
    }

    #[test]
    fn test_snapshot_error_conversion() {
        let error: SnapshotFetchError = IsapiError::Status {
            status: 404,
            reason: "Not Found".to_string(),
        }
        .into();
        assert_eq!(error.to_string(), "Snapshot request returned HTTP 404 Not Found");

        let error: SnapshotFetchError = IsapiError::Network("reset".to_string()).into();
        assert!(matches!(error, SnapshotFetchError::Http(_)));
    }

    #[test]
    fn test_sdk_error_display() {
        let error = SdkError::Configuration("address must not be empty".to_string());
        assert_eq!(error.to_string(), "Configuration error: address must not be empty");

        let error: SdkError = ConnectionError::Unreachable("timed out".to_string()).into();
        assert_eq!(error.to_string(), "Connection error: Camera unreachable: timed out");
    }
}
