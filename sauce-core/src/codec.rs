//! Inbound payload decoding
//!
//! Two envelopes come back from the service:
//!
//! - **Event frames** on the WebSocket:
//!   `{"type":"..","success":true,"uid":1,"data":{..}}`
//! - **Call replies** on the RPC channel: `{"success":true,"value":..}`
//!
//! Decoding answers a three-way question: is there something to deliver
//! (`Ok(Some(_))`), is there nothing to deliver (`Ok(None)`: a reply frame,
//! a negative reply, or no data), or is the payload broken (`Err`)?
//!
//! # Two passes
//!
//! Frames are parsed twice. The first pass reads only the envelope header and
//! decides whether the frame is deliverable at all; the second decodes the
//! payload into the caller's type. This keeps a reply frame or a negative
//! reply from failing just because its `data` does not match the event type,
//! while both passes still report positions relative to the original text.
//!
//! # Examples
//!
//! ```rust
//! use sauce_core::codec;
//! use serde_json::{json, Value};
//!
//! let event: Option<Value> =
//!     codec::decode_event(r#"{"type":"event","success":true,"data":{"x":1}}"#).unwrap();
//! assert_eq!(event, Some(json!({"x": 1})));
//!
//! let nothing: Option<Value> =
//!     codec::decode_event(r#"{"type":"response","success":true,"data":{"x":1}}"#).unwrap();
//! assert!(nothing.is_none());
//! ```

use crate::error::{DecodeError, Error, Result};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

/// Frame type of a reply to a request sent over the event channel
pub const RESPONSE_TYPE: &str = "response";

/// Header of an event-channel frame
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeHeader {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "crate::lenient::option_number_or_string")]
    pub uid: Option<i64>,
    #[serde(default)]
    data: Option<IgnoredAny>,
}

impl EnvelopeHeader {
    /// Whether this frame is a reply to a request rather than an event
    pub fn is_response(&self) -> bool {
        self.kind == RESPONSE_TYPE
    }

    /// Whether the frame carries a non-null `data` field
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Whether an event handler should see this frame
    pub fn is_deliverable(&self) -> bool {
        !self.is_response() && self.success && self.has_data()
    }
}

/// Full event-channel frame
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope<T> {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "crate::lenient::option_number_or_string")]
    pub uid: Option<i64>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct CallHeader {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    value: Option<IgnoredAny>,
}

/// RPC reply body
#[derive(Debug, Clone, Deserialize)]
pub struct CallEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub value: Option<T>,
}

/// Parse `text` as `T`, keeping enough context for diagnostics on failure
pub fn decode_as<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::Decode(DecodeError::from_serde(&e, text)))
}

/// Parse only the header of an event-channel frame
pub fn decode_header(text: &str) -> Result<EnvelopeHeader> {
    decode_as(text)
}

/// Decode an event-channel frame
///
/// Returns `Ok(None)` for reply frames, negative replies and frames without
/// data. Returns `Err(Error::Decode(_))` only when the text is not JSON or
/// does not have the envelope shape.
pub fn decode_event<T: DeserializeOwned>(text: &str) -> Result<Option<T>> {
    if !decode_header(text)?.is_deliverable() {
        return Ok(None);
    }

    let envelope: WireEnvelope<T> = decode_as(text)?;
    Ok(envelope.data)
}

/// Decode an RPC reply body
///
/// Returns `Ok(None)` when `success` is false (or the value is null), and
/// `Err(Error::Decode(_))` when the body is malformed.
pub fn decode_call_reply<T: DeserializeOwned>(text: &str) -> Result<Option<T>> {
    let header: CallHeader = decode_as(text)?;
    if !header.success || header.value.is_none() {
        return Ok(None);
    }

    let envelope: CallEnvelope<T> = decode_as(text)?;
    Ok(envelope.value)
}
