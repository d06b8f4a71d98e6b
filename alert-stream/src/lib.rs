//! Alert stream processing for Hikvision cameras.
//!
//! The camera's `/ISAPI/Event/notification/alertStream` endpoint keeps an
//! HTTP response open and writes one XML `EventNotificationAlert` per
//! detection report. This crate turns that body into state transitions:
//!
//! - [`ChunkReader`] frames the body into `Content-Length` delimited chunks
//! - [`EventStreamParser`] parses each chunk and applies it to the registry
//! - [`ActiveEventTracker`] remembers which event types are active
//!
//! ```rust,ignore
//! let tracker = ActiveEventTracker::shared();
//! let mut parser = EventStreamParser::new(tracker.clone());
//! let mut reader = ChunkReader::new(body_stream);
//!
//! while let Some(chunk) = reader.next_chunk().await? {
//!     for transition in parser.process_chunk(&chunk)? {
//!         println!("{transition:?}");
//!     }
//! }
//! ```

pub mod chunk;
pub mod error;
pub mod model;
pub mod parser;
pub mod tracker;

pub use chunk::{ChunkReader, StreamChunk, DEFAULT_MAX_CHUNK_LEN};
pub use error::{ChunkParseError, StreamReadError, TrackerError};
pub use model::{event_types, AlertEvent, AlertTransition, EventState, ALERT_ROOT};
pub use parser::EventStreamParser;
pub use tracker::{ActiveEventTracker, SharedTracker};
