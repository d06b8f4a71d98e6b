//! Host notification interface.

use std::fmt;

use alert_stream::AlertTransition;
use bytes::Bytes;

/// Why a camera is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfflineDetail {
    /// Credentials or address need to change; no automatic retry
    ConfigurationError,
    /// The connection failed or dropped; the heartbeat retries
    CommunicationError,
}

/// Connection status reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline {
        detail: OfflineDetail,
        reason: Option<String>,
    },
}

impl ConnectionStatus {
    pub fn offline(detail: OfflineDetail, reason: impl Into<String>) -> Self {
        ConnectionStatus::Offline {
            detail,
            reason: Some(reason.into()),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionStatus::Online)
    }

    /// Equal ignoring the reason text.
    pub fn same_kind(&self, other: &ConnectionStatus) -> bool {
        match (self, other) {
            (ConnectionStatus::Online, ConnectionStatus::Online) => true,
            (
                ConnectionStatus::Offline { detail: a, .. },
                ConnectionStatus::Offline { detail: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Online => write!(f, "online"),
            ConnectionStatus::Offline { detail, reason } => {
                write!(f, "offline ({detail:?})")?;
                if let Some(reason) = reason {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
        }
    }
}

/// Receives everything the SDK reports about a camera.
///
/// Callbacks run on SDK tasks, in the order the camera reported the
/// underlying alerts. Implementations should return quickly.
pub trait NotificationSink: Send + Sync {
    /// First `active` report for an event type.
    fn on_event_activated(&self, event_type: &str);

    /// An active event type was cleared.
    fn on_event_deactivated(&self, event_type: &str);

    /// The camera reported zero active events while none were tracked.
    fn on_all_events_cleared(&self) {}

    /// A new snapshot, or `None` when fetching it failed.
    fn on_snapshot_updated(&self, _image: Option<Bytes>) {}

    fn on_connection_status_changed(&self, _status: ConnectionStatus) {}
}

/// Deliver a parser transition to `sink`.
pub fn dispatch(sink: &dyn NotificationSink, transition: &AlertTransition) {
    match transition {
        AlertTransition::EventActivated(event_type) => sink.on_event_activated(event_type),
        AlertTransition::EventDeactivated(event_type) => sink.on_event_deactivated(event_type),
        AlertTransition::AllCleared => sink.on_all_events_cleared(),
    }
}
