//! Incremental parser for `EventNotificationAlert` chunks.
//!
//! Each chunk is tokenized completely into typed field records before any of
//! them touches the tracker. A chunk with bad markup is therefore rejected
//! whole and leaves the registry as it was.

use std::collections::HashSet;
use std::mem;

use quick_xml::events::Event;
use quick_xml::name::LocalName;
use quick_xml::Reader;

use crate::chunk::StreamChunk;
use crate::error::ChunkParseError;
use crate::model::{AlertEvent, AlertTransition, EventState, ALERT_ROOT};
use crate::tracker::{ActiveEventTracker, SharedTracker};

/// A completed child element of an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AlertField {
    EventType(String),
    EventState(EventState),
    DateTime(String),
    ActivePostCount(u32),
    Other { name: String, value: String },
}

impl AlertField {
    fn complete(name: String, value: String) -> Result<Self, ChunkParseError> {
        let field = match name.as_str() {
            "eventType" => AlertField::EventType(value),
            "eventState" => AlertField::EventState(EventState::from_wire(&value)),
            "dateTime" => AlertField::DateTime(value),
            "activePostCount" => AlertField::ActivePostCount(
                value
                    .trim()
                    .parse()
                    .map_err(|_| ChunkParseError::InvalidPostCount(value))?,
            ),
            _ => AlertField::Other { name, value },
        };
        Ok(field)
    }
}

/// Tokenizer state for one chunk.
#[derive(Debug, Default)]
struct Scan {
    in_alert: bool,
    /// Last opened child element, cleared when it closes
    current: Option<String>,
    text: String,
    fields: Vec<AlertField>,
    alerts: Vec<Vec<AlertField>>,
}

impl Scan {
    fn open(&mut self, name: String) -> Result<(), ChunkParseError> {
        if name == ALERT_ROOT {
            if self.in_alert {
                return Err(ChunkParseError::NestedAlert(ALERT_ROOT));
            }
            self.in_alert = true;
            self.current = None;
            self.fields.clear();
        } else if self.in_alert {
            self.current = Some(name);
            self.text.clear();
        }
        Ok(())
    }

    fn empty(&mut self, name: String) -> Result<(), ChunkParseError> {
        if name == ALERT_ROOT {
            if self.in_alert {
                return Err(ChunkParseError::NestedAlert(ALERT_ROOT));
            }
            self.alerts.push(Vec::new());
        } else if self.in_alert {
            self.current = None;
            self.fields.push(AlertField::complete(name, String::new())?);
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if self.in_alert && self.current.is_some() && text != "\n" {
            self.text.push_str(text);
        }
    }

    fn close(&mut self, name: String) -> Result<(), ChunkParseError> {
        if !self.in_alert {
            return Ok(());
        }
        if name == ALERT_ROOT {
            self.in_alert = false;
            self.current = None;
            self.alerts.push(mem::take(&mut self.fields));
        } else if self.current.as_deref() == Some(name.as_str()) {
            self.current = None;
            let value = mem::take(&mut self.text);
            self.fields.push(AlertField::complete(name, value)?);
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<Vec<AlertField>>, ChunkParseError> {
        if self.in_alert {
            return Err(ChunkParseError::UnterminatedAlert(ALERT_ROOT));
        }
        Ok(self.alerts)
    }
}

fn element_name(name: LocalName<'_>) -> Result<String, ChunkParseError> {
    Ok(std::str::from_utf8(name.as_ref())?.to_string())
}

/// Tokenize a chunk into the fields of each alert it contains.
fn scan_chunk(bytes: &[u8]) -> Result<Vec<Vec<AlertField>>, ChunkParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.check_end_names(true);

    let mut scan = Scan::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => scan.open(element_name(e.local_name())?)?,
            Event::Empty(e) => scan.empty(element_name(e.local_name())?)?,
            Event::End(e) => scan.close(element_name(e.local_name())?)?,
            Event::Text(t) => scan.text(&t.unescape()?),
            Event::CData(c) => scan.text(std::str::from_utf8(&c.into_inner())?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    scan.finish()
}

/// Applies alert chunks to the active event registry.
///
/// The parser holds no state between chunks beyond counters; everything
/// that outlives a chunk lives in the shared tracker.
pub struct EventStreamParser {
    tracker: SharedTracker,
    accepted_types: Option<HashSet<String>>,
    chunks_processed: u64,
    chunks_rejected: u64,
}

impl EventStreamParser {
    pub fn new(tracker: SharedTracker) -> Self {
        Self {
            tracker,
            accepted_types: None,
            chunks_processed: 0,
            chunks_rejected: 0,
        }
    }

    /// Only activate the given event types. Others are parsed and ignored.
    pub fn with_accepted_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.accepted_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    /// Chunks that parsed and were applied.
    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed
    }

    /// Chunks dropped because of malformed content.
    pub fn chunks_rejected(&self) -> u64 {
        self.chunks_rejected
    }

    pub fn process_chunk(&mut self, chunk: &StreamChunk) -> Result<Vec<AlertTransition>, ChunkParseError> {
        self.process_bytes(chunk.as_bytes())
    }

    /// Parse one chunk and return the transitions it caused, in wire order.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<Vec<AlertTransition>, ChunkParseError> {
        let alerts = match scan_chunk(bytes) {
            Ok(alerts) => alerts,
            Err(e) => {
                self.chunks_rejected += 1;
                return Err(e);
            }
        };
        self.chunks_processed += 1;

        let mut transitions = Vec::new();
        let mut tracker = self.tracker.lock();
        for fields in alerts {
            self.apply_alert(&mut tracker, fields, &mut transitions);
        }
        Ok(transitions)
    }

    fn apply_alert(
        &self,
        tracker: &mut ActiveEventTracker,
        fields: Vec<AlertField>,
        transitions: &mut Vec<AlertTransition>,
    ) {
        let mut draft = AlertEvent::default();
        // Entry this alert inserted; later fields go to it.
        let mut registered: Option<String> = None;
        // Already active entry this alert re-reports.
        let mut reported: Option<String> = None;

        for field in fields {
            match field {
                AlertField::EventType(event_type) => {
                    if tracker.update_existing(&event_type, &draft.start_time, draft.initial_post_count) {
                        tracing::trace!(event_type = %event_type, "Alert re-reports an active event");
                        reported = Some(event_type.clone());
                    }
                    target(&mut draft, registered.as_deref(), tracker).event_type = event_type;
                }
                AlertField::DateTime(value) => {
                    target(&mut draft, registered.as_deref(), tracker).start_time = value;
                    if let Some(event_type) = &reported {
                        tracker.update_existing(event_type, &draft.start_time, draft.initial_post_count);
                    }
                }
                AlertField::ActivePostCount(0) => {
                    let cleared = tracker.clear_all();
                    if cleared.is_empty() {
                        tracing::trace!("Zero post count with nothing active");
                        transitions.push(AlertTransition::AllCleared);
                    } else {
                        tracing::debug!(count = cleared.len(), "Zero post count clears active events");
                        transitions.extend(cleared.into_iter().map(AlertTransition::EventDeactivated));
                    }
                    registered = None;
                    reported = None;
                }
                AlertField::ActivePostCount(count) => {
                    let event = target(&mut draft, registered.as_deref(), tracker);
                    if event.initial_post_count > 0 {
                        event.current_post_count = count;
                    } else {
                        event.initial_post_count = count;
                    }
                    if let Some(event_type) = &reported {
                        tracker.update_existing(event_type, &draft.start_time, draft.initial_post_count);
                    }
                }
                AlertField::EventState(state) => {
                    target(&mut draft, registered.as_deref(), tracker).state = state;
                    if state == EventState::Active && registered.is_none() {
                        registered = self.activate(tracker, &draft, transitions);
                    }
                }
                AlertField::Other { name, value } => {
                    target(&mut draft, registered.as_deref(), tracker)
                        .raw_fields
                        .insert(name, value);
                }
            }
        }

        tracing::trace!(alert = %draft, "Parsed alert");
    }

    /// Insert `draft` if its type is not yet active. Returns the inserted type.
    fn activate(
        &self,
        tracker: &mut ActiveEventTracker,
        draft: &AlertEvent,
        transitions: &mut Vec<AlertTransition>,
    ) -> Option<String> {
        let event_type = draft.event_type.as_str();
        if event_type.is_empty() {
            tracing::warn!("Alert reported an active state before any eventType, ignoring");
            return None;
        }
        if tracker.contains(event_type) {
            return None;
        }
        if let Some(accepted) = &self.accepted_types {
            if !accepted.contains(event_type) {
                tracing::debug!(event_type, "No handler for event type, not activating");
                return None;
            }
        }

        match tracker.insert(event_type, draft.clone()) {
            Ok(()) => {
                tracing::debug!(event_type, start = %draft.start_time, "Event activated");
                transitions.push(AlertTransition::EventActivated(event_type.to_string()));
                Some(event_type.to_string())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Activation skipped");
                None
            }
        }
    }
}

/// The event that field updates apply to: the registered entry once the
/// alert has been inserted, otherwise the draft.
fn target<'a>(
    draft: &'a mut AlertEvent,
    registered: Option<&str>,
    tracker: &'a mut ActiveEventTracker,
) -> &'a mut AlertEvent {
    let Some(event_type) = registered else {
        return draft;
    };
    match tracker.lookup_mut(event_type) {
        Some(event) => event,
        None => draft,
    }
}
