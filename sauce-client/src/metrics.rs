//! Client metrics
//!
//! OpenTelemetry instruments for sessions and calls. Created by
//! `ClientBuilder` only when observability is enabled; everything else in
//! the crate takes an `Option<Arc<ClientMetrics>>` and records nothing when
//! it is `None`.
//!
//! # Metrics Collected
//!
//! - **sauce.client.events.received**: events delivered to a handler, by topic
//! - **sauce.client.events.dropped**: frames dropped by the single-flight guard
//! - **sauce.client.decode.errors**: malformed payloads, by channel
//! - **sauce.client.reconnections**: (re)connections, by reason
//! - **sauce.client.disconnections**: disconnections, by reason
//! - **sauce.client.calls.total** / **sauce.client.call.duration**: RPC calls
//!   by method and status
//! - **sauce.client.subscriptions.opened**: sessions opened, by topic

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

/// Decode errors on the event stream
pub const CHANNEL_EVENTS: &str = "events";
/// Decode errors on RPC replies
pub const CHANNEL_RPC: &str = "rpc";

pub struct ClientMetrics {
    pub events_received: Counter<u64>,
    pub events_dropped: Counter<u64>,
    pub decode_errors: Counter<u64>,
    pub reconnections: Counter<u64>,
    pub disconnections: Counter<u64>,
    pub calls_total: Counter<u64>,
    /// Seconds from URL build to decoded reply
    pub call_duration: Histogram<f64>,
    pub subscriptions_opened: Counter<u64>,
}

impl ClientMetrics {
    /// Instruments on the global meter, scoped to the service name
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let meter = global::meter_with_scope(scope);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            events_received: meter
                .u64_counter("sauce.client.events.received")
                .with_description("Events delivered to a subscription handler")
                .build(),
            events_dropped: meter
                .u64_counter("sauce.client.events.dropped")
                .with_description("Frames dropped while the subscription was busy")
                .build(),
            decode_errors: meter
                .u64_counter("sauce.client.decode.errors")
                .with_description("Payloads that failed to decode")
                .build(),
            reconnections: meter
                .u64_counter("sauce.client.reconnections")
                .with_description("Connections established, including the first")
                .build(),
            disconnections: meter
                .u64_counter("sauce.client.disconnections")
                .with_description("Connections lost or closed")
                .build(),
            calls_total: meter
                .u64_counter("sauce.client.calls.total")
                .with_description("RPC calls issued")
                .build(),
            call_duration: meter
                .f64_histogram("sauce.client.call.duration")
                .with_description("RPC call duration in seconds")
                .build(),
            subscriptions_opened: meter
                .u64_counter("sauce.client.subscriptions.opened")
                .with_description("Subscription sessions opened")
                .build(),
        }
    }

    pub fn record_event(&self, topic: &str) {
        self.events_received
            .add(1, &[KeyValue::new("topic", topic.to_string())]);
    }

    pub fn record_dropped(&self, topic: &str) {
        self.events_dropped
            .add(1, &[KeyValue::new("topic", topic.to_string())]);
    }

    /// `channel` is [`CHANNEL_EVENTS`] or [`CHANNEL_RPC`]
    pub fn record_decode_error(&self, channel: &'static str) {
        self.decode_errors.add(1, &[KeyValue::new("channel", channel)]);
    }

    pub fn record_reconnection(&self, reason: &'static str) {
        self.reconnections.add(1, &[KeyValue::new("reason", reason)]);
    }

    pub fn record_disconnection(&self, reason: &'static str) {
        self.disconnections.add(1, &[KeyValue::new("reason", reason)]);
    }

    /// `status` is one of `delivered`, `empty`, `malformed`, `transport_error`
    pub fn record_call(&self, method: &str, status: &'static str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    pub fn record_subscription(&self, topic: &str) {
        self.subscriptions_opened
            .add(1, &[KeyValue::new("topic", topic.to_string())]);
    }
}
