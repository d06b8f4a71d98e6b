//! Test helpers for fixture-based alert stream tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use alert_stream::StreamReadError;
use bytes::Bytes;

fn fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);
    path
}

/// Load an XML alert fixture as text
pub fn load_alert(filename: &str) -> String {
    fs::read_to_string(fixture_path(filename))
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

/// Load a raw stream capture
pub fn load_capture(filename: &str) -> Vec<u8> {
    fs::read(fixture_path(filename))
        .unwrap_or_else(|e| panic!("Failed to load capture {}: {}", filename, e))
}

/// Frame payloads the way the camera writes multipart parts
pub fn frame(payloads: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(b"--boundary\r\nContent-Type: application/xml; charset=\"UTF-8\"\r\n");
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
        out.extend_from_slice(payload);
    }
    out
}

/// Split `bytes` at the given offsets into a stream of reads
pub fn split_stream(
    bytes: &[u8],
    cuts: &[usize],
) -> futures::stream::Iter<std::vec::IntoIter<Result<Bytes, StreamReadError>>> {
    let mut offsets: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    offsets.push(0);
    offsets.push(bytes.len());
    offsets.sort_unstable();
    offsets.dedup();

    let reads: Vec<Result<Bytes, StreamReadError>> = offsets
        .windows(2)
        .map(|w| Ok(Bytes::copy_from_slice(&bytes[w[0]..w[1]])))
        .collect();
    futures::stream::iter(reads)
}
