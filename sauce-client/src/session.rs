//! Subscription sessions
//!
//! A session binds one [`Subscription`] to one duplex transport:
//!
//! ```text
//! Created → Connecting → Open → (Reconnecting → Open)* → Closed
//! ```
//!
//! Three reactions are registered on the transport before it starts:
//!
//! - **reconnected**: log, then resend the subscribe frame. The server
//!   forgets subscriptions when a connection drops, so this runs after the
//!   first connect and after every reconnect.
//! - **disconnected**: log only. Retry timing belongs to the transport.
//! - **message**: [`EventDispatcher::dispatch`]
//!
//! # Single-flight dispatch
//!
//! Each session owns an `AtomicBool` next to (not inside) its subscription.
//! A frame is decoded and handed to the handler only if a compare-and-swap
//! from `false` to `true` succeeds; a frame arriving while the handler still
//! runs is dropped. The flag is released by a guard, so it is cleared even
//! when the handler panics.

use crate::metrics::{ClientMetrics, CHANNEL_EVENTS};
use crate::transport::{DisconnectReason, DuplexTransport, ReconnectReason};
use sauce_core::{codec, diagnose, wire, CorrelationIds, Error, Result, Subscription};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Empty or whitespace-only payload
    Blank,
    /// Another frame of this subscription was still being handled
    Contended,
    /// A response frame, `success == false`, or no data
    Skipped,
    /// The payload did not decode; a diagnostic was logged
    Malformed,
    /// The handler was called
    Delivered,
}

/// Clears the in-flight flag on drop
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Decodes frames for one subscription and feeds the handler, one at a time
pub struct EventDispatcher<T, F> {
    subscription: Subscription,
    in_flight: AtomicBool,
    handler: F,
    metrics: Option<Arc<ClientMetrics>>,
    _event: PhantomData<fn() -> T>,
}

impl<T, F> EventDispatcher<T, F>
where
    T: DeserializeOwned,
    F: Fn(T) + Send + Sync,
{
    pub fn new(subscription: Subscription, handler: F) -> Self {
        Self {
            subscription,
            in_flight: AtomicBool::new(false),
            handler,
            metrics: None,
            _event: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<ClientMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Handle one inbound frame
    pub fn dispatch(&self, text: &str) -> DispatchOutcome {
        if text.trim().is_empty() {
            return DispatchOutcome::Blank;
        }

        let topic = self.subscription.topic();
        let uid = self.subscription.uid();

        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            tracing::debug!(uid, topic, "Already processing a message, dropping frame");
            if let Some(ref m) = self.metrics {
                m.record_dropped(topic);
            }
            return DispatchOutcome::Contended;
        };

        match codec::decode_event::<T>(text) {
            Ok(Some(event)) => {
                tracing::info!(uid, topic, raw = %text, "Event");
                if let Some(ref m) = self.metrics {
                    m.record_event(topic);
                }
                (self.handler)(event);
                DispatchOutcome::Delivered
            }
            Ok(None) => {
                tracing::trace!(uid, topic, "Nothing to deliver");
                DispatchOutcome::Skipped
            }
            Err(Error::Decode(error)) => {
                diagnose(&error, text, topic).emit();
                if let Some(ref m) = self.metrics {
                    m.record_decode_error(CHANNEL_EVENTS);
                }
                DispatchOutcome::Malformed
            }
            Err(other) => {
                tracing::error!(uid, topic, error = %other, "Failed to decode event");
                DispatchOutcome::Malformed
            }
        }
    }
}

/// An open subscription on its own transport
pub struct Session {
    subscription: Subscription,
    transport: Arc<dyn DuplexTransport>,
    ids: Arc<CorrelationIds>,
}

impl Session {
    /// Wire `subscription` onto `transport` and start it
    ///
    /// Handlers are registered before the transport starts, so the subscribe
    /// frame goes out with the first connection. An already started
    /// transport is not started again; in that case the subscribe frame is
    /// sent with its next reconnect.
    pub async fn open<T, F>(
        transport: Arc<dyn DuplexTransport>,
        subscription: Subscription,
        handler: F,
        ids: Arc<CorrelationIds>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Result<Self>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let uid = subscription.uid();
        let topic = subscription.topic().to_string();

        {
            let weak = Arc::downgrade(&transport);
            let message = subscription.message().to_string();
            let topic = topic.clone();
            let metrics = metrics.clone();
            transport.on_reconnected(Arc::new(move |reason: ReconnectReason| {
                tracing::debug!(uid, topic = %topic, reason = %reason, "Reconnected");
                if let Some(ref m) = metrics {
                    m.record_reconnection(reason.as_str());
                }
                let Some(transport) = weak.upgrade() else {
                    tracing::warn!(uid, topic = %topic, "Session dropped, subscribe frame not resent");
                    return;
                };
                if let Err(e) = transport.send(message.clone()) {
                    tracing::warn!(uid, topic = %topic, error = %e, "Failed to resend subscribe frame");
                }
            }));
        }

        {
            let topic = topic.clone();
            let metrics = metrics.clone();
            transport.on_disconnected(Arc::new(move |reason: DisconnectReason| {
                tracing::debug!(uid, topic = %topic, reason = %reason, "Disconnected");
                if let Some(ref m) = metrics {
                    m.record_disconnection(reason.as_str());
                }
            }));
        }

        let dispatcher =
            EventDispatcher::new(subscription.clone(), handler).with_metrics(metrics.clone());
        transport.on_message(Arc::new(move |text: &str| {
            dispatcher.dispatch(text);
        }));

        if transport.is_started() {
            tracing::debug!(uid, topic = %topic, "Transport already started");
        } else {
            transport.start().await?;
        }

        if let Some(ref m) = metrics {
            m.record_subscription(&topic);
        }

        Ok(Self {
            subscription,
            transport,
            ids,
        })
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// The session's transport; stopping it is up to the caller
    pub fn transport(&self) -> &Arc<dyn DuplexTransport> {
        &self.transport
    }

    /// Send the unsubscribe frame; the connection stays open
    pub fn close(&self) -> Result<()> {
        let frame = wire::build_unsubscribe(&self.ids, self.subscription.sub_id())?;
        tracing::debug!(
            uid = self.subscription.uid(),
            topic = self.subscription.topic(),
            "Unsubscribing"
        );
        self.transport.send(frame)
    }

    /// Stop the transport
    pub async fn stop(&self) {
        self.transport.stop().await;
    }
}

/// A session dropped while its transport is still running stops the
/// transport, unless the caller kept its own handle to it.
impl Drop for Session {
    fn drop(&mut self) {
        if Arc::strong_count(&self.transport) > 1 || !self.transport.is_started() {
            return;
        }

        let uid = self.subscription.uid();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(uid, topic = self.subscription.topic(), "Session dropped, stopping transport");
                let transport = self.transport.clone();
                runtime.spawn(async move { transport.stop().await });
            }
            Err(_) => {
                tracing::warn!(
                    uid,
                    topic = self.subscription.topic(),
                    "Session dropped outside a runtime, transport left running"
                );
            }
        }
    }
}
