//! Core wire logic for the Sauce event service
//!
//! This crate holds everything about the protocol that does not touch a
//! socket:
//!
//! - **Correlation ids**: one atomic counter shared by every frame a client
//!   sends
//! - **Wire messages**: subscribe/unsubscribe frames and RPC call URLs
//! - **Decoding**: event frames and call replies, with number-or-string
//!   leniency
//! - **Diagnostics**: locating the bytes that broke a parse
//! - **Observability**: OpenTelemetry and `tracing` bootstrap
//!
//! The connection handling lives in `sauce-client`.

pub mod codec;
pub mod correlation;
pub mod diagnostics;
pub mod error;
pub mod lenient;
pub mod observability;
pub mod wire;

pub use codec::{CallEnvelope, EnvelopeHeader, WireEnvelope};
pub use correlation::CorrelationIds;
pub use diagnostics::{diagnose, DiagnosticReport};
pub use error::{DecodeCategory, DecodeError, Error, ErrorPosition, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use wire::Subscription;
