//! Configuration types for the hikvision-sdk crate
//!
//! [`CameraConfig`] describes one camera: where it is, how to log in, which
//! event types the host cares about and how the connection and snapshot
//! timers behave. It can be built in code or loaded from JSON, where
//! durations are written as integer milliseconds.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use isapi_client::Credentials;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Configuration for a single camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Host, host:port or base URL of the camera
    pub address: String,

    /// Account used for Basic authentication
    pub credentials: Credentials,

    /// Event types the host handles; `None` accepts every type
    pub event_types: Option<BTreeSet<String>>,

    /// Event types whose activation starts the fast snapshot refresh
    pub snapshot_linked_types: BTreeSet<String>,

    /// Periodic snapshot refresh in seconds, 0 disables it
    /// Default: 0
    pub snapshot_refresh_interval: u64,

    /// Snapshot refresh period while a linked event is active
    /// Default: 1 second
    #[serde(rename = "active_snapshot_interval_ms", with = "duration_ms")]
    pub active_snapshot_interval: Duration,

    /// Delay before the first heartbeat
    /// Default: 5 seconds
    #[serde(rename = "heartbeat_delay_ms", with = "duration_ms")]
    pub heartbeat_delay: Duration,

    /// Heartbeat period
    /// Default: 10 seconds
    #[serde(rename = "heartbeat_period_ms", with = "duration_ms")]
    pub heartbeat_period: Duration,

    /// Reconnect attempts after which each further attempt logs a warning
    /// Default: 10
    pub reconnect_warn_threshold: u32,

    /// TCP connect timeout for every request, also the limit for the alert
    /// stream handshake to return its response headers
    /// Default: 5 seconds
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Overall timeout for a snapshot request
    /// Default: 10 seconds
    #[serde(rename = "snapshot_timeout_ms", with = "duration_ms")]
    pub snapshot_timeout: Duration,

    /// Drop the stream when no complete chunk arrives for this long
    /// Default: disabled
    #[serde(rename = "stream_idle_timeout_ms", with = "optional_duration_ms")]
    pub stream_idle_timeout: Option<Duration>,

    /// Largest chunk the reader accepts
    /// Default: 1 MiB
    pub max_chunk_len: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            credentials: Credentials::default(),
            event_types: None,
            snapshot_linked_types: BTreeSet::new(),
            snapshot_refresh_interval: 0,
            active_snapshot_interval: Duration::from_secs(1),
            heartbeat_delay: Duration::from_secs(5),
            heartbeat_period: Duration::from_secs(10),
            reconnect_warn_threshold: 10,
            connect_timeout: isapi_client::DEFAULT_CONNECT_TIMEOUT,
            snapshot_timeout: isapi_client::DEFAULT_REQUEST_TIMEOUT,
            stream_idle_timeout: None,
            max_chunk_len: alert_stream::DEFAULT_MAX_CHUNK_LEN,
        }
    }
}

impl CameraConfig {
    /// Create a config for `address` with default timers
    pub fn new(address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            address: address.into(),
            credentials,
            ..Default::default()
        }
    }

    /// Parse a config from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SdkError::ConfigFile {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SdkError::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| SdkError::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(SdkError::Configuration(
                "Camera address must not be empty".to_string(),
            ));
        }

        if self.heartbeat_period == Duration::ZERO {
            return Err(SdkError::Configuration(
                "Heartbeat period must be greater than 0".to_string(),
            ));
        }

        if self.active_snapshot_interval == Duration::ZERO {
            return Err(SdkError::Configuration(
                "Active snapshot interval must be greater than 0".to_string(),
            ));
        }

        if self.stream_idle_timeout == Some(Duration::ZERO) {
            return Err(SdkError::Configuration(
                "Stream idle timeout must be greater than 0 when set".to_string(),
            ));
        }

        if self.connect_timeout == Duration::ZERO {
            return Err(SdkError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_chunk_len == 0 {
            return Err(SdkError::Configuration(
                "Max chunk length must be greater than 0".to_string(),
            ));
        }

        if let Some(accepted) = &self.event_types {
            if let Some(unreachable) = self
                .snapshot_linked_types
                .iter()
                .find(|t| !accepted.contains(*t))
            {
                return Err(SdkError::Configuration(format!(
                    "Snapshot-linked event type {unreachable} is not in the accepted event types"
                )));
            }
        }

        Ok(())
    }

    /// Period of the background snapshot refresh, if enabled
    pub fn snapshot_refresh_period(&self) -> Option<Duration> {
        (self.snapshot_refresh_interval > 0)
            .then(|| Duration::from_secs(self.snapshot_refresh_interval))
    }

    pub fn is_snapshot_linked(&self, event_type: &str) -> bool {
        self.snapshot_linked_types.contains(event_type)
    }

    // Builder pattern methods for fluent configuration

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_event_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.event_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_snapshot_link(mut self, event_type: impl Into<String>) -> Self {
        self.snapshot_linked_types.insert(event_type.into());
        self
    }

    pub fn with_snapshot_refresh(mut self, seconds: u64) -> Self {
        self.snapshot_refresh_interval = seconds;
        self
    }

    pub fn with_active_snapshot_interval(mut self, interval: Duration) -> Self {
        self.active_snapshot_interval = interval;
        self
    }

    pub fn with_heartbeat(mut self, delay: Duration, period: Duration) -> Self {
        self.heartbeat_delay = delay;
        self.heartbeat_period = period;
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
