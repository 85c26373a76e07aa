//! Byte-string escaping.

use crate::models::LibraryError;

/// Escape bytes for a quoted MySQL string literal, the way the server's own
/// client library does.
pub fn escape_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &byte in data {
        match byte {
            0 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            0x1a => out.extend_from_slice(b"\\Z"),
            other => out.push(other),
        }
    }
    out
}

/// Skips a library's escape routine for empty input.
///
/// Some runtime and library combinations fault when escaping an empty buffer;
/// an empty buffer escapes to itself, so the library is never asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmptyEscapeGuard {
    enabled: bool,
}

impl EmptyEscapeGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn escape<F>(&self, data: &[u8], escape: F) -> Result<Vec<u8>, LibraryError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, LibraryError>,
    {
        if self.enabled && data.is_empty() {
            return Ok(Vec::new());
        }
        escape(data)
    }
}
