//! Parse-failure diagnostics
//!
//! When a frame fails to decode, a log line saying "invalid type at line 1
//! column 4012" is not much help on a single-line, 8 KB JSON frame. This
//! module cuts the raw text at the reported position so the log shows the
//! offending bytes and everything after them, along with the JSON path of the
//! failure when it can be recovered.
//!
//! Diagnostics are observational: building and emitting a report never
//! changes what the caller does with the error.
//!
//! # Positions
//!
//! Lines are 0-based. Columns are byte counts within the line, following the
//! parser: the offending byte is the `column`-th byte of its line. Multi-byte
//! characters are skipped by their raw byte length, so a cut can land inside
//! a character; such partial characters are rendered as U+FFFD.

use crate::error::{DecodeError, ErrorPosition};

/// What a failed decode looked like, ready to be logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticReport {
    /// The failure position is unknown or lies outside the text
    Unknown {
        /// Endpoint or method being decoded
        label: String,
        /// Raw text from the last located line start
        fragment: String,
        /// The complete raw text
        full: String,
    },
    /// The failure position was located
    Located {
        label: String,
        /// JSON path of the failure, empty when unknown
        path: String,
        /// Raw text from the failure position to the end
        fragment: String,
        full: String,
    },
}

impl DiagnosticReport {
    /// The cut-out part of the raw text
    pub fn fragment(&self) -> &str {
        match self {
            DiagnosticReport::Unknown { fragment, .. } => fragment,
            DiagnosticReport::Located { fragment, .. } => fragment,
        }
    }

    /// Whether the failure position was found in the text
    pub fn is_located(&self) -> bool {
        matches!(self, DiagnosticReport::Located { .. })
    }

    /// Write the report to the log
    pub fn emit(&self) {
        match self {
            DiagnosticReport::Unknown {
                label,
                fragment,
                full,
            } => {
                tracing::error!(
                    endpoint = %label,
                    raw = %fragment,
                    full = %full,
                    "Parsing error at unknown position"
                );
            }
            DiagnosticReport::Located {
                label,
                path,
                fragment,
                full,
            } => {
                tracing::error!(
                    endpoint = %label,
                    path = %path,
                    raw = %fragment,
                    full = %full,
                    "Parsing error"
                );
            }
        }
    }
}

/// Locate `error` inside `raw` and build a report for `label`
pub fn diagnose(error: &DecodeError, raw: &str, label: &str) -> DiagnosticReport {
    let position = match error.position {
        Some(position) => position,
        None => {
            return DiagnosticReport::Unknown {
                label: label.to_string(),
                fragment: raw.to_string(),
                full: raw.to_string(),
            }
        }
    };

    let line_start = match line_start(raw, position.line) {
        Ok(offset) => offset,
        Err(last_found) => {
            return DiagnosticReport::Unknown {
                label: label.to_string(),
                fragment: raw[last_found..].to_string(),
                full: raw.to_string(),
            }
        }
    };

    let line = &raw.as_bytes()[line_start..];
    let skip = position.column.saturating_sub(1).min(line.len());

    DiagnosticReport::Located {
        label: label.to_string(),
        path: error.path.clone().unwrap_or_default(),
        fragment: String::from_utf8_lossy(&line[skip..]).into_owned(),
        full: raw.to_string(),
    }
}

/// Byte offset where 0-based `line` starts
///
/// On failure returns the start of the last line that was found.
fn line_start(raw: &str, line: usize) -> Result<usize, usize> {
    let mut offset = 0;
    for _ in 0..line {
        match raw[offset..].find('\n') {
            Some(found) => offset += found + 1,
            None => return Err(offset),
        }
    }
    Ok(offset)
}

enum Frame {
    Object {
        key: Option<String>,
        expecting_key: bool,
    },
    Array {
        index: usize,
    },
}

/// Recover the JSON path (`$.data.riders[3].power`) of the value being
/// parsed at `position`
///
/// Scans the text up to the failure and tracks open containers. Returns
/// `None` when the position is outside the text.
pub fn json_path_at(raw: &str, position: ErrorPosition) -> Option<String> {
    let start = line_start(raw, position.line).ok()?;
    let end = (start + position.column).min(raw.len());
    let bytes = &raw.as_bytes()[..end];

    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let begin = i + 1;
                i = begin;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                let text = &bytes[begin..i.min(bytes.len())];
                if let Some(Frame::Object {
                    key,
                    expecting_key: true,
                }) = stack.last_mut()
                {
                    *key = Some(String::from_utf8_lossy(text).into_owned());
                }
            }
            b'{' => stack.push(Frame::Object {
                key: None,
                expecting_key: true,
            }),
            b'[' => stack.push(Frame::Array { index: 0 }),
            b'}' | b']' => {
                stack.pop();
            }
            b':' => {
                if let Some(Frame::Object { expecting_key, .. }) = stack.last_mut() {
                    *expecting_key = false;
                }
            }
            b',' => match stack.last_mut() {
                Some(Frame::Object { key, expecting_key }) => {
                    *key = None;
                    *expecting_key = true;
                }
                Some(Frame::Array { index }) => *index += 1,
                None => {}
            },
            _ => {}
        }
        i += 1;
    }

    let mut path = String::from("$");
    for frame in &stack {
        match frame {
            Frame::Object { key: Some(key), .. } => {
                path.push('.');
                path.push_str(key);
            }
            Frame::Object { key: None, .. } => break,
            Frame::Array { index } => path.push_str(&format!("[{}]", index)),
        }
    }

    Some(path)
}
