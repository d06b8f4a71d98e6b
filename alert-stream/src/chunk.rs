//! Content-Length framing for the persistent alert stream body.
//!
//! The camera keeps the HTTP response open and writes one part per alert:
//!
//! ```text
//! --boundary
//! Content-Type: application/xml; charset="UTF-8"
//! Content-Length: 478
//!
//! <EventNotificationAlert ...>...</EventNotificationAlert>
//! ```
//!
//! [`ChunkReader`] skips every line until a `Content-Length` header, reads
//! the rest of the part headers up to the empty line, then takes exactly the
//! declared number of bytes verbatim as one [`StreamChunk`].

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::StreamReadError;

const CONTENT_LENGTH: &str = "Content-Length:";

/// Default upper bound for a declared chunk length.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 1024 * 1024;

/// Noise without a newline is dropped once it grows past this.
const MAX_HEADER_LINE: usize = 8 * 1024;

/// One complete payload block taken off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    declared_len: usize,
    payload: Bytes,
}

impl StreamChunk {
    /// Wrap a payload whose declared length is its actual length.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            declared_len: payload.len(),
            payload,
        }
    }

    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// Scanning lines for a length header
    Header,
    /// Length known, reading the rest of the part headers up to the blank line
    PartHeaders(usize),
    /// Waiting for the payload bytes
    Payload(usize),
}

/// Splits a byte stream into length-prefixed chunks.
///
/// One reader serves one connection. `next_chunk` is cancel safe: partial
/// frames stay buffered in the reader, so it can be raced against shutdown
/// or a timeout and resumed later.
pub struct ChunkReader<S> {
    stream: S,
    buffer: BytesMut,
    frame: Frame,
    max_chunk_len: usize,
    exhausted: bool,
}

impl<S> ChunkReader<S>
where
    S: Stream<Item = Result<Bytes, StreamReadError>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            frame: Frame::Header,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            exhausted: false,
        }
    }

    /// Reject chunks declaring more than `limit` bytes.
    pub fn with_max_chunk_len(mut self, limit: usize) -> Self {
        self.max_chunk_len = limit;
        self
    }

    /// Wait for the next complete chunk.
    ///
    /// Returns `Ok(None)` once the stream has closed. Bytes of an incomplete
    /// trailing chunk are discarded at that point.
    pub async fn next_chunk(&mut self) -> Result<Option<StreamChunk>, StreamReadError> {
        loop {
            if let Some(chunk) = self.try_extract()? {
                return Ok(Some(chunk));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.stream.next().await {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(e),
                None => {
                    self.exhausted = true;
                    if !self.buffer.is_empty() {
                        tracing::debug!(
                            pending = self.buffer.len(),
                            "Alert stream closed mid-chunk, discarding partial data"
                        );
                        self.buffer.clear();
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Adapt the reader into a stream of chunks that ends on close or error.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamChunk, StreamReadError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    fn try_extract(&mut self) -> Result<Option<StreamChunk>, StreamReadError> {
        loop {
            match self.frame {
                Frame::Header | Frame::PartHeaders(_) => {
                    let Some(line) = self.take_line() else {
                        if self.buffer.len() > MAX_HEADER_LINE {
                            tracing::warn!(
                                discarded = self.buffer.len(),
                                "Dropping oversized header line"
                            );
                            self.buffer.clear();
                        }
                        return Ok(None);
                    };

                    self.frame = match self.frame {
                        Frame::PartHeaders(0) if line.is_empty() => {
                            tracing::trace!("Skipping empty chunk");
                            Frame::Header
                        }
                        Frame::PartHeaders(len) if line.is_empty() => Frame::Payload(len),
                        Frame::PartHeaders(len) => {
                            tracing::trace!(line = %line, "Skipping part header");
                            Frame::PartHeaders(len)
                        }
                        _ => match parse_content_length(&line) {
                            Some(len) if len > self.max_chunk_len => {
                                return Err(StreamReadError::ChunkTooLarge {
                                    declared: len,
                                    limit: self.max_chunk_len,
                                });
                            }
                            Some(len) => Frame::PartHeaders(len),
                            None => {
                                tracing::trace!(line = %line, "Skipping stream boundary line");
                                Frame::Header
                            }
                        },
                    };
                }
                Frame::Payload(len) => {
                    if self.buffer.len() < len {
                        return Ok(None);
                    }
                    let payload = self.buffer.split_to(len).freeze();
                    self.frame = Frame::Header;
                    return Ok(Some(StreamChunk {
                        declared_len: len,
                        payload,
                    }));
                }
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|b| *b == b'\n')?;
        let line = self.buffer.split_to(newline + 1);
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }
}

/// Parse a `Content-Length: N` line. Anything else, including a header with
/// a non-numeric value, is treated as boundary noise.
fn parse_content_length(line: &str) -> Option<usize> {
    extract_header_value(line, CONTENT_LENGTH)?.parse().ok()
}

fn extract_header_value<'a>(line: &'a str, header: &str) -> Option<&'a str> {
    if line.len() > header.len()
        && line.is_char_boundary(header.len())
        && line[..header.len()].eq_ignore_ascii_case(header)
    {
        Some(line[header.len()..].trim())
    } else {
        None
    }
}
