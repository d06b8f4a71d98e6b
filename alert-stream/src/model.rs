//! Data types produced by the alert parser.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};

/// Root element of every alert notification.
pub const ALERT_ROOT: &str = "EventNotificationAlert";

/// Event type keys emitted by Hikvision cameras.
pub mod event_types {
    /// Motion detection
    pub const MOTION: &str = "VMD";
    /// Line crossing detection
    pub const LINE_CROSSING: &str = "linedetection";
    /// Intrusion (field) detection
    pub const INTRUSION: &str = "fielddetection";
    /// Video signal loss; also sent periodically as a keepalive
    pub const VIDEO_LOSS: &str = "videoloss";

    /// The detection types a camera channel is normally configured for.
    pub const ALL: [&str; 4] = [MOTION, LINE_CROSSING, INTRUSION, VIDEO_LOSS];
}

/// State reported in `<eventState>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventState {
    Active,
    Inactive,
    #[default]
    Unknown,
}

impl EventState {
    /// Map the wire value. Only the exact literal `active` is actionable.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "active" => EventState::Active,
            "inactive" => EventState::Inactive,
            _ => EventState::Unknown,
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventState::Active => write!(f, "active"),
            EventState::Inactive => write!(f, "inactive"),
            EventState::Unknown => write!(f, "unknown"),
        }
    }
}

/// One detection notification as described by a single alert element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertEvent {
    pub event_type: String,
    pub state: EventState,
    /// Raw `dateTime` text of the alert that opened this event
    pub start_time: String,
    /// Start time of the latest alert that re-reported this type
    pub end_time: Option<String>,
    pub initial_post_count: u32,
    pub current_post_count: u32,
    /// Every other child element, captured verbatim
    pub raw_fields: BTreeMap<String, String>,
}

impl AlertEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    /// The start time as a timestamp, when the device sent RFC 3339.
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(self.start_time.trim()).ok()
    }

    /// Look up a descriptive field such as `channelID` or `eventDescription`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.raw_fields.get(name).map(String::as_str)
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) start={} end={} posts={}/{}",
            self.event_type,
            self.state,
            self.start_time,
            self.end_time.as_deref().unwrap_or("-"),
            self.initial_post_count,
            self.current_post_count
        )
    }
}

/// State change produced by parsing a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertTransition {
    /// First `active` report for a type that was not tracked
    EventActivated(String),
    /// A tracked type was cleared by a zero post count
    EventDeactivated(String),
    /// A zero post count arrived while nothing was tracked
    AllCleared,
}

impl AlertTransition {
    /// Event type the transition applies to, if any.
    pub fn event_type(&self) -> Option<&str> {
        match self {
            AlertTransition::EventActivated(t) | AlertTransition::EventDeactivated(t) => Some(t),
            AlertTransition::AllCleared => None,
        }
    }
}
