//! Outbound wire messages
//!
//! The service speaks two dialects:
//!
//! - **Event channel** (WebSocket): request frames of the form
//!   `{"type":"request","uid":..,"data":{"method":..,"arg":{..}}}` for
//!   subscribe and unsubscribe.
//! - **RPC channel** (HTTP GET): the method and its arguments are encoded
//!   into the URL path, one base64(JSON) segment per argument.
//!
//! A [`Subscription`] is built once, with its subscribe frame rendered up
//! front, so the session can resend the exact same text after every
//! reconnect.
//!
//! # Examples
//!
//! ```rust
//! use sauce_core::{wire, CorrelationIds};
//!
//! let ids = CorrelationIds::starting_at(100);
//! let subscription = wire::build_subscribe(&ids, "nearby", false).unwrap();
//! assert_eq!(subscription.uid(), 101);
//! assert_eq!(subscription.sub_id(), 102);
//!
//! let url = wire::build_call_url("getAthlete", &["self"]).unwrap();
//! assert_eq!(url, "/api/rpc/v2/getAthlete/InNlbGYi");
//! ```

use crate::correlation::CorrelationIds;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::Serialize;

/// Path prefix of every RPC call
pub const RPC_PATH: &str = "/api/rpc/v2";

/// Path of the duplex event endpoint on the service host
pub const EVENTS_PATH: &str = "/api/ws/events";

/// A subscription request, ready to be sent
///
/// Immutable once built. The single-flight state used while dispatching
/// events lives in the session, not here, so a `Subscription` can be cloned
/// and shared freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    uid: i64,
    sub_id: i64,
    topic: String,
    persistent: bool,
    message: String,
}

impl Subscription {
    /// Correlation id of the subscribe frame
    pub fn uid(&self) -> i64 {
        self.uid
    }

    /// Server-side subscription id, needed to unsubscribe
    pub fn sub_id(&self) -> i64 {
        self.sub_id
    }

    /// Event topic, e.g. `athlete/watching`
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the subscribe frame asks for a persistent subscription
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// The rendered subscribe frame
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Serialize)]
struct RequestFrame<'a, A> {
    #[serde(rename = "type")]
    kind: &'static str,
    uid: i64,
    data: RequestData<'a, A>,
}

#[derive(Serialize)]
struct RequestData<'a, A> {
    method: &'a str,
    arg: A,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeArg<'a> {
    event: &'a str,
    sub_id: i64,
    // The service treats an absent field differently from `false`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    persistent: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnsubscribeArg {
    sub_id: i64,
}

fn render_request<A: Serialize>(uid: i64, method: &str, arg: A) -> Result<String> {
    let frame = RequestFrame {
        kind: "request",
        uid,
        data: RequestData { method, arg },
    };
    serde_json::to_string(&frame).map_err(|e| Error::Serialization(e.to_string()))
}

/// Build a subscription for `topic`, allocating its `uid` and `subId`
pub fn build_subscribe(ids: &CorrelationIds, topic: &str, persistent: bool) -> Result<Subscription> {
    let uid = ids.next_id();
    let sub_id = ids.next_id();

    let message = render_request(
        uid,
        "subscribe",
        SubscribeArg {
            event: topic,
            sub_id,
            persistent,
        },
    )?;

    Ok(Subscription {
        uid,
        sub_id,
        topic: topic.to_string(),
        persistent,
        message,
    })
}

/// Render an unsubscribe frame for `sub_id` under a fresh `uid`
pub fn build_unsubscribe(ids: &CorrelationIds, sub_id: i64) -> Result<String> {
    render_request(ids.next_id(), "unsubscribe", UnsubscribeArg { sub_id })
}

/// Render the URL path for an RPC call
///
/// Each argument becomes one path segment: its JSON text, UTF-8 encoded,
/// then base64 encoded with the standard padded alphabet. Argument order is
/// preserved.
pub fn build_call_url<A: Serialize>(method: &str, args: &[A]) -> Result<String> {
    let mut url = format!("{}/{}", RPC_PATH, method);

    for arg in args {
        let json = serde_json::to_string(arg).map_err(|e| Error::Serialization(e.to_string()))?;
        url.push('/');
        url.push_str(&BASE64_STANDARD.encode(json.as_bytes()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn decode_segment(segment: &str) -> Value {
        let bytes = BASE64_STANDARD.decode(segment).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let ids = CorrelationIds::starting_at(10);
        let subscription = build_subscribe(&ids, "groups", false).unwrap();

        let frame: Value = serde_json::from_str(subscription.message()).unwrap();
        assert_eq!(
            frame,
            json!({
                "type": "request",
                "uid": 11,
                "data": {
                    "method": "subscribe",
                    "arg": {"event": "groups", "subId": 12}
                }
            })
        );
        assert!(!subscription.message().contains("persistent"));
        assert_eq!(subscription.topic(), "groups");
        assert!(!subscription.is_persistent());
    }

    #[test]
    fn test_persistent_subscribe_includes_flag() {
        let ids = CorrelationIds::starting_at(0);
        let subscription = build_subscribe(&ids, "chat", true).unwrap();

        assert!(subscription.message().contains("\"persistent\":true"));
        let frame: Value = serde_json::from_str(subscription.message()).unwrap();
        assert_eq!(frame["data"]["arg"]["persistent"], json!(true));
        assert_eq!(frame["data"]["arg"]["subId"], json!(subscription.sub_id()));
    }

    #[test]
    fn test_subscribe_frame_field_order() {
        let ids = CorrelationIds::starting_at(0);
        let subscription = build_subscribe(&ids, "nearby", false).unwrap();

        assert_eq!(
            subscription.message(),
            r#"{"type":"request","uid":1,"data":{"method":"subscribe","arg":{"event":"nearby","subId":2}}}"#
        );
    }

    #[test]
    fn test_unsubscribe_frame() {
        let ids = CorrelationIds::starting_at(99);
        let text = build_unsubscribe(&ids, 42).unwrap();

        assert_eq!(
            text,
            r#"{"type":"request","uid":100,"data":{"method":"unsubscribe","arg":{"subId":42}}}"#
        );
    }

    #[test]
    fn test_unsubscribe_uses_fresh_uid() {
        let ids = CorrelationIds::starting_at(0);
        let subscription = build_subscribe(&ids, "rideon", false).unwrap();
        let text = build_unsubscribe(&ids, subscription.sub_id()).unwrap();

        let frame: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["uid"], json!(3));
        assert_eq!(frame["data"]["arg"]["subId"], json!(2));
    }

    #[test]
    fn test_call_url_without_arguments() {
        let url = build_call_url::<Value>("getVersion", &[]).unwrap();
        assert_eq!(url, "/api/rpc/v2/getVersion");
    }

    #[test]
    fn test_call_url_segments_decode_back_to_arguments() {
        let args = vec![json!("bar"), json!(3)];
        let url = build_call_url("foo", &args).unwrap();

        let rest = url.strip_prefix("/api/rpc/v2/foo/").unwrap();
        let decoded: Vec<Value> = rest.split('/').map(decode_segment).collect();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_call_url_encodes_utf8_and_objects() {
        let args = vec![json!({"name": "Zoë", "ids": [1, 2]})];
        let url = build_call_url("updateAthlete", &args).unwrap();

        // The standard alphabet puts a '/' inside this segment
        let segment = url.strip_prefix("/api/rpc/v2/updateAthlete/").unwrap();
        assert_eq!(segment, "eyJpZHMiOlsxLDJdLCJuYW1lIjoiWm/DqyJ9");
        assert_eq!(decode_segment(segment), args[0]);
    }

    #[test]
    fn test_call_url_keeps_standard_alphabet_symbols() {
        let url = build_call_url("search", &["~~~"]).unwrap();
        assert_eq!(url, "/api/rpc/v2/search/In5+fiI=");

        let segment = url.strip_prefix("/api/rpc/v2/search/").unwrap();
        assert_eq!(decode_segment(segment), json!("~~~"));
    }
}
