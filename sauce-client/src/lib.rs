//! Client for the Sauce event service
//!
//! The service exposes two channels on one host:
//!
//! - an **event stream** at `ws(s)://{host}/api/ws/events`: send a subscribe
//!   frame, receive `{"type":..,"success":..,"uid":..,"data":..}` events
//! - **RPC calls** at `GET /api/rpc/v2/{method}/{base64(json(arg))}/...`,
//!   answered with `{"success":..,"value":..}`
//!
//! # Core Features
//!
//! - **Sessions**: one WebSocket per subscription, subscribe frame resent
//!   after every reconnect
//! - **Single-flight dispatch**: at most one event per subscription is in
//!   the handler at a time; overlapping frames are dropped
//! - **RPC**: typed replies, malformed replies surface as errors, network
//!   failures as "no value"
//! - **Reconnection**: fixed delay, exponential backoff, or none
//! - **Observability**: `tracing` everywhere, optional OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sauce_client::SauceClient;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Watching {
//!     #[serde(deserialize_with = "sauce_core::lenient::number_or_string")]
//!     athlete_id: i64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SauceClient::builder("http://localhost:1080").build()?;
//!
//!     let session = client
//!         .subscribe_to(client.watching(false)?, |state: Watching| {
//!             println!("Watching athlete {}", state.athlete_id);
//!         })
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.unsubscribe_from(&session)?;
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

mod catalog;
mod client;
mod client_builder;
mod connection_state;
mod http;
mod metrics;
mod reconnect;
mod rpc;
mod session;
mod transport;
mod ws_transport;

pub use catalog::{CHAT, GROUPS, NEARBY, RIDEON, WATCHING};
pub use client::SauceClient;
pub use client_builder::{events_endpoint, ClientBuilder, BASE_URL_ENV, DEFAULT_BASE_URL};
pub use connection_state::{ConnectionManager, ConnectionState};
pub use http::{HttpTransport, ReqwestTransport};
pub use metrics::ClientMetrics;
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
pub use rpc::RpcCaller;
pub use session::{DispatchOutcome, EventDispatcher, Session};
pub use transport::{
    Connector, DisconnectReason, DisconnectedFn, DuplexTransport, HandlerRegistry, MessageFn,
    ReconnectReason, ReconnectedFn,
};
pub use ws_transport::{
    StrategyFactory, WsConnector, WsTransport, DEFAULT_IDLE_TIMEOUT, DEFAULT_NAME,
};

/// Subscription constructors that draw from an explicit id counter
pub mod topics {
    pub use crate::catalog::{chat, groups, nearby, rideon, watching};
}
