//! Registry of event types the camera currently reports as active.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TrackerError;
use crate::model::AlertEvent;

/// Tracker handle shared between the read loop and its owner.
pub type SharedTracker = Arc<Mutex<ActiveEventTracker>>;

/// Maps event type to the alert that first activated it.
///
/// A type is present at most once; absence means inactive. The whole map
/// is emptied when the device reports a zero post count.
#[derive(Debug, Default)]
pub struct ActiveEventTracker {
    active: HashMap<String, AlertEvent>,
}

impl ActiveEventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tracker wrapped for sharing.
    pub fn shared() -> SharedTracker {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn lookup(&self, event_type: &str) -> Option<&AlertEvent> {
        self.active.get(event_type)
    }

    pub(crate) fn lookup_mut(&mut self, event_type: &str) -> Option<&mut AlertEvent> {
        self.active.get_mut(event_type)
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.active.contains_key(event_type)
    }

    /// Register `event` as the active entry for `event_type`.
    pub fn insert(&mut self, event_type: &str, event: AlertEvent) -> Result<(), TrackerError> {
        if self.active.contains_key(event_type) {
            return Err(TrackerError::AlreadyActive(event_type.to_string()));
        }
        tracing::trace!(event_type, "Tracking active event");
        self.active.insert(event_type.to_string(), event);
        Ok(())
    }

    /// Fold a re-report of an already active type into its stored entry.
    ///
    /// The re-report's start time becomes the entry's end time and its post
    /// count becomes the entry's current count. An empty start time leaves
    /// the end time as it was. Returns false when the type is not tracked.
    pub fn update_existing(&mut self, event_type: &str, start_time: &str, post_count: u32) -> bool {
        match self.active.get_mut(event_type) {
            Some(existing) => {
                if !start_time.is_empty() {
                    existing.end_time = Some(start_time.to_string());
                }
                existing.current_post_count = post_count;
                true
            }
            None => false,
        }
    }

    /// Empty the registry and return the types that were active.
    ///
    /// An empty result means nothing was tracked; callers report that as
    /// the idle signal.
    pub fn clear_all(&mut self) -> Vec<String> {
        let mut cleared: Vec<String> = self.active.drain().map(|(event_type, _)| event_type).collect();
        cleared.sort();
        cleared
    }

    /// Drop all entries without reporting them.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active types in sorted order.
    pub fn active_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.active.keys().cloned().collect();
        types.sort();
        types
    }

    /// Cloned entries, sorted by event type.
    pub fn snapshot(&self) -> Vec<AlertEvent> {
        let mut events: Vec<AlertEvent> = self.active.values().cloned().collect();
        events.sort_by(|a, b| a.event_type.cmp(&b.event_type));
        events
    }
}
