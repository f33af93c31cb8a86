//! Error types for sauce
//!
//! The protocol distinguishes very few real failures. Most problems (a
//! negative reply, a dropped connection, a busy subscription) degrade to
//! "nothing to deliver this time" and never become an `Error`. What remains:
//!
//! - **Malformed payloads**: the text is not JSON, or does not match the
//!   envelope shape. Carried as [`DecodeError`] so the diagnostics module can
//!   point at the offending bytes.
//! - **Transport errors**: WebSocket and HTTP failures, reported by the
//!   transports themselves. The RPC caller swallows these; the session
//!   layer only sees them when sending.
//! - **Configuration errors**: an unusable base address.
//!
//! # Examples
//!
//! ```rust
//! use sauce_core::{codec, Error};
//!
//! let err = codec::decode_event::<serde_json::Value>("{\"type\":").unwrap_err();
//! assert!(matches!(err, Error::Decode(_)));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for sauce operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for sauce operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Inbound payload could not be decoded
    ///
    /// Raised to callers only on the RPC path; the event path logs it and
    /// moves on.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound value could not be serialized to JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// HTTP transport layer error (network failure or non-success status)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Base address or endpoint could not be used
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The duplex connection is stopped and no longer accepts frames
    #[error("Connection closed")]
    ConnectionClosed,

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Location of a parse failure inside the raw text
///
/// `line` is 0-based (line 0 is the start of the text). `column` follows the
/// parser's convention: the offending byte is the `column`-th byte of that
/// line, counted from 1, so skipping `column - 1` bytes from the line start
/// lands on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPosition {
    pub line: usize,
    pub column: usize,
}

/// What kind of problem the parser hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeCategory {
    /// Not well-formed JSON
    Syntax,
    /// Well-formed JSON with the wrong shape or types
    Data,
    /// Input ended in the middle of a value
    Eof,
    /// Reader failure; carries no position
    Io,
}

impl fmt::Display for DecodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeCategory::Syntax => "syntax",
            DecodeCategory::Data => "data",
            DecodeCategory::Eof => "eof",
            DecodeCategory::Io => "io",
        };
        f.write_str(name)
    }
}

/// A payload that failed to decode
///
/// Built from a `serde_json::Error` plus the raw text it was parsing, so the
/// JSON path of the failure can be recovered even though serde does not
/// report one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub message: String,
    pub category: DecodeCategory,
    pub position: Option<ErrorPosition>,
    pub path: Option<String>,
}

impl DecodeError {
    /// Capture a serde_json failure that happened while parsing `raw`
    pub fn from_serde(err: &serde_json::Error, raw: &str) -> Self {
        let category = match err.classify() {
            serde_json::error::Category::Syntax => DecodeCategory::Syntax,
            serde_json::error::Category::Data => DecodeCategory::Data,
            serde_json::error::Category::Eof => DecodeCategory::Eof,
            serde_json::error::Category::Io => DecodeCategory::Io,
        };

        // serde_json reports line 0 when it has no position at all
        let position = (err.line() > 0).then(|| ErrorPosition {
            line: err.line() - 1,
            column: err.column(),
        });

        let path = position.and_then(|pos| crate::diagnostics::json_path_at(raw, pos));

        Self {
            message: err.to_string(),
            category,
            position,
            path,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;
        if let Some(ref path) = self.path {
            write!(f, " (at {})", path)?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeError {}
