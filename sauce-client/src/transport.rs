//! Transport contracts
//!
//! Sessions and calls never touch sockets directly. They talk to two small
//! traits:
//!
//! - [`DuplexTransport`]: one event-stream connection with explicit handler
//!   registration for "reconnected", "disconnected" and "message received"
//! - [`HttpTransport`](crate::HttpTransport): base-address-relative GETs
//!
//! Handlers run on the transport's own task and must return quickly.

use async_trait::async_trait;
use sauce_core::Result;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use url::Url;

/// Why a connection was (re)established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconnectReason {
    /// First connection after `start()`
    Initial,
    /// The stream ended without a close frame
    Lost,
    /// Nothing was received within the idle timeout
    NoMessageReceived,
    /// A read, write or connect error
    Error,
    /// `reconnect()` was called
    ByUser,
    /// The server sent a close frame
    ByServer,
}

impl ReconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconnectReason::Initial => "initial",
            ReconnectReason::Lost => "lost",
            ReconnectReason::NoMessageReceived => "no_message_received",
            ReconnectReason::Error => "error",
            ReconnectReason::ByUser => "by_user",
            ReconnectReason::ByServer => "by_server",
        }
    }
}

impl fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a connection went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// `stop()` was called, or the reconnection strategy gave up
    Exit,
    Lost,
    NoMessageReceived,
    Error,
    ByUser,
    ByServer,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Exit => "exit",
            DisconnectReason::Lost => "lost",
            DisconnectReason::NoMessageReceived => "no_message_received",
            DisconnectReason::Error => "error",
            DisconnectReason::ByUser => "by_user",
            DisconnectReason::ByServer => "by_server",
        }
    }

    /// The reason the following reconnect will carry, `None` for `Exit`
    pub fn reconnect_reason(&self) -> Option<ReconnectReason> {
        match self {
            DisconnectReason::Exit => None,
            DisconnectReason::Lost => Some(ReconnectReason::Lost),
            DisconnectReason::NoMessageReceived => Some(ReconnectReason::NoMessageReceived),
            DisconnectReason::Error => Some(ReconnectReason::Error),
            DisconnectReason::ByUser => Some(ReconnectReason::ByUser),
            DisconnectReason::ByServer => Some(ReconnectReason::ByServer),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler for "connection established"
pub type ReconnectedFn = Arc<dyn Fn(ReconnectReason) + Send + Sync>;
/// Handler for "connection lost"
pub type DisconnectedFn = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
/// Handler for inbound text frames
pub type MessageFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A duplex text connection to the event stream
///
/// Implementations own connect, framing and reconnect timing. Callers
/// register handlers before `start()`; every handler registered is invoked
/// for every matching lifecycle event.
#[async_trait]
pub trait DuplexTransport: Send + Sync {
    /// Register a handler for (re)connection
    fn on_reconnected(&self, handler: ReconnectedFn);

    /// Register a handler for disconnection
    fn on_disconnected(&self, handler: DisconnectedFn);

    /// Register a handler for inbound text frames
    fn on_message(&self, handler: MessageFn);

    /// Whether `start()` succeeded and `stop()` has not been called since
    fn is_started(&self) -> bool;

    /// Open the connection; a no-op on a started transport
    async fn start(&self) -> Result<()>;

    /// Queue a text frame
    ///
    /// Never blocks, so it can be called from inside a handler.
    fn send(&self, text: String) -> Result<()>;

    /// Drop the current connection and connect again
    async fn reconnect(&self) -> Result<()>;

    /// Close the connection and stop reconnecting
    async fn stop(&self);
}

/// Creates one duplex transport per endpoint
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Url) -> Arc<dyn DuplexTransport>;
}

/// Handler lists shared by transport implementations
///
/// Handlers are cloned out of the lock before being called, so a handler
/// may register further handlers or call back into the transport. A
/// panicking handler is logged and does not affect the others.
#[derive(Default)]
pub struct HandlerRegistry {
    reconnected: RwLock<Vec<ReconnectedFn>>,
    disconnected: RwLock<Vec<DisconnectedFn>>,
    message: RwLock<Vec<MessageFn>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reconnected(&self, handler: ReconnectedFn) {
        push(&self.reconnected, handler);
    }

    pub fn add_disconnected(&self, handler: DisconnectedFn) {
        push(&self.disconnected, handler);
    }

    pub fn add_message(&self, handler: MessageFn) {
        push(&self.message, handler);
    }

    pub fn fire_reconnected(&self, reason: ReconnectReason) {
        for handler in snapshot(&self.reconnected) {
            guarded("reconnected", || handler(reason));
        }
    }

    pub fn fire_disconnected(&self, reason: DisconnectReason) {
        for handler in snapshot(&self.disconnected) {
            guarded("disconnected", || handler(reason));
        }
    }

    pub fn fire_message(&self, text: &str) {
        for handler in snapshot(&self.message) {
            guarded("message", || handler(text));
        }
    }
}

fn push<H>(list: &RwLock<Vec<H>>, handler: H) {
    list.write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(handler);
}

fn snapshot<H: Clone>(list: &RwLock<Vec<H>>) -> Vec<H> {
    list.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn guarded(kind: &'static str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        tracing::error!(handler = kind, "Transport handler panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_every_handler_is_called() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            registry.add_message(Arc::new(move |_text: &str| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        registry.fire_message("{}");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_others() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));

        registry.add_reconnected(Arc::new(|_reason: ReconnectReason| panic!("handler failure")));
        let seen_clone = seen.clone();
        registry.add_reconnected(Arc::new(move |reason: ReconnectReason| {
            assert_eq!(reason, ReconnectReason::Initial);
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        registry.fire_reconnected(ReconnectReason::Initial);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_register_from_inside_a_call() {
        let registry = Arc::new(HandlerRegistry::new());
        let inner = registry.clone();

        registry.add_disconnected(Arc::new(move |_reason: DisconnectReason| {
            inner.add_disconnected(Arc::new(|_: DisconnectReason| {}));
        }));

        registry.fire_disconnected(DisconnectReason::Lost);
        assert_eq!(snapshot(&registry.disconnected).len(), 2);
    }

    #[test]
    fn test_disconnect_maps_to_reconnect_reason() {
        assert_eq!(DisconnectReason::Exit.reconnect_reason(), None);
        assert_eq!(
            DisconnectReason::ByServer.reconnect_reason(),
            Some(ReconnectReason::ByServer)
        );
        assert_eq!(
            DisconnectReason::NoMessageReceived.reconnect_reason(),
            Some(ReconnectReason::NoMessageReceived)
        );
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ReconnectReason::ByUser.to_string(), "by_user");
        assert_eq!(DisconnectReason::Exit.to_string(), "exit");
    }
}
