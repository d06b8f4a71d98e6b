//! Error types for the alert-stream crate.

use std::time::Duration;

/// Errors raised while reading framed chunks off the alert stream.
///
/// Every variant ends the current connection; the supervisor treats them
/// the same way as a graceful close and reconnects on the next heartbeat.
#[derive(Debug, thiserror::Error)]
pub enum StreamReadError {
    /// The underlying socket failed
    #[error("I/O error on alert stream: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP layer failed while delivering body bytes
    #[error("Transport error on alert stream: {0}")]
    Transport(String),

    /// A `Content-Length` header declared more bytes than the reader accepts
    #[error("Declared chunk length {declared} exceeds limit of {limit} bytes")]
    ChunkTooLarge {
        /// Length announced by the device
        declared: usize,
        /// Configured maximum
        limit: usize,
    },

    /// No complete chunk arrived within the idle limit
    #[error("No alert data received for {0:?}")]
    IdleTimeout(Duration),
}

/// Errors raised while parsing a single chunk.
///
/// A chunk that fails to parse is dropped whole. The stream keeps going.
#[derive(Debug, thiserror::Error)]
pub enum ChunkParseError {
    /// The tokenizer rejected the markup
    #[error("Malformed alert markup: {0}")]
    Xml(#[from] quick_xml::Error),

    /// `activePostCount` did not hold an unsigned integer
    #[error("Invalid activePostCount value: {0:?}")]
    InvalidPostCount(String),

    /// The chunk ended inside an alert element
    #[error("Chunk ended before </{0}>")]
    UnterminatedAlert(&'static str),

    /// An alert element was opened inside another alert element
    #[error("Nested <{0}> element")]
    NestedAlert(&'static str),

    /// Element or text bytes were not valid UTF-8
    #[error("Invalid UTF-8 in alert chunk: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors from registry operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The event type already has an active entry
    #[error("Event type already active: {0}")]
    AlreadyActive(String),
}
