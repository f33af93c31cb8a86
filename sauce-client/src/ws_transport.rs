//! WebSocket implementation of [`DuplexTransport`]
//!
//! One driver task owns the socket. It multiplexes three things with
//! `tokio::select!`:
//!
//! - outbound frames queued by `send()` (an unbounded channel, so `send` can
//!   be called from inside handlers)
//! - inbound frames, dispatched synchronously to the message handlers
//! - the idle timer, reset on every inbound frame
//!
//! When the connection ends for any reason other than `stop()`, the driver
//! asks the `ConnectionManager` for the next delay and reconnects, firing
//! the reconnected handlers with the reason the previous connection ended.
//! A failed first connect is handled the same way, with `Initial` as the
//! reason. Frames queued while disconnected are dropped.

use crate::connection_state::{ConnectionManager, ConnectionState};
use crate::reconnect::{FixedDelay, ReconnectionStrategy};
use crate::transport::{
    Connector, DisconnectReason, DisconnectedFn, DuplexTransport, HandlerRegistry, MessageFn,
    ReconnectReason, ReconnectedFn,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use sauce_core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Builds a fresh reconnection strategy for each transport
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn ReconnectionStrategy> + Send + Sync>;

/// Reconnect when nothing arrives for this long
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Transport name used in log fields
pub const DEFAULT_NAME: &str = "sauce-client";

enum Command {
    Send(String),
    Reconnect,
    Stop,
}

enum Reopen {
    Connected(WsStream),
    GaveUp,
    Stopped,
}

/// Event-stream connection over tokio-tungstenite
#[derive(Clone)]
pub struct WsTransport {
    inner: Arc<WsInner>,
}

struct WsInner {
    url: Url,
    name: String,
    idle_timeout: Option<Duration>,
    handlers: HandlerRegistry,
    connection: ConnectionManager,
    started: AtomicBool,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    driver: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Create an unstarted transport for `url`
    ///
    /// `idle_timeout: None` disables the no-message reconnect.
    pub fn new(
        url: Url,
        name: impl Into<String>,
        idle_timeout: Option<Duration>,
        strategy: Box<dyn ReconnectionStrategy>,
    ) -> Self {
        Self {
            inner: Arc::new(WsInner {
                url,
                name: name.into(),
                idle_timeout,
                handlers: HandlerRegistry::new(),
                connection: ConnectionManager::new(strategy),
                started: AtomicBool::new(false),
                commands: Mutex::new(None),
                driver: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.connection.state().await
    }
}

impl WsInner {
    fn commands(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Command>>> {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn command(&self, command: Command) -> Result<()> {
        match self.commands().as_ref() {
            Some(sender) => sender.send(command).map_err(|_| Error::ConnectionClosed),
            None => Err(Error::ConnectionClosed),
        }
    }

    async fn run(
        self: Arc<Self>,
        first: Option<WsStream>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut pending = first;
        let mut reason = ReconnectReason::Initial;

        if pending.is_none() {
            self.connection.disconnected().await;
            self.handlers.fire_disconnected(DisconnectReason::Error);
        }

        loop {
            let stream = match pending.take() {
                Some(stream) => stream,
                None => match self.reopen(&mut commands, reason == ReconnectReason::ByUser).await {
                    Reopen::Connected(stream) => stream,
                    Reopen::GaveUp => {
                        self.handlers.fire_disconnected(DisconnectReason::Exit);
                        break;
                    }
                    Reopen::Stopped => {
                        self.connection.disconnected().await;
                        self.handlers.fire_disconnected(DisconnectReason::Exit);
                        break;
                    }
                },
            };

            self.connection.connected().await;
            tracing::info!(name = %self.name, reason = %reason, "Connected");
            self.handlers.fire_reconnected(reason);

            let ended = self.pump(stream, &mut commands).await;

            tracing::info!(name = %self.name, reason = %ended, "Disconnected");
            self.connection.disconnected().await;
            self.handlers.fire_disconnected(ended);

            match ended.reconnect_reason() {
                Some(next) => reason = next,
                None => break,
            }
        }

        self.commands().take();
        self.started.store(false, Ordering::Release);
    }

    /// Move frames until the connection ends
    async fn pump(
        &self,
        stream: WsStream,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> DisconnectReason {
        let (mut sink, mut source) = stream.split();
        let idle_limit = self.idle_timeout;
        let idle = tokio::time::sleep(idle_limit.unwrap_or(Duration::MAX));
        tokio::pin!(idle);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::warn!(name = %self.name, error = %e, "Failed to send frame");
                            return DisconnectReason::Error;
                        }
                    }
                    Some(Command::Reconnect) => {
                        let _ = sink.close().await;
                        return DisconnectReason::ByUser;
                    }
                    Some(Command::Stop) | None => {
                        let _ = sink.close().await;
                        return DisconnectReason::Exit;
                    }
                },
                frame = source.next() => {
                    if let Some(limit) = idle_limit {
                        idle.as_mut().reset(Instant::now() + limit);
                    }
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handlers.fire_message(&text),
                        Some(Ok(Message::Close(_))) => return DisconnectReason::ByServer,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(name = %self.name, error = %e, "WebSocket error");
                            return DisconnectReason::Error;
                        }
                        None => return DisconnectReason::Lost,
                    }
                },
                _ = &mut idle, if idle_limit.is_some() => {
                    tracing::warn!(name = %self.name, "No message received within idle timeout");
                    return DisconnectReason::NoMessageReceived;
                }
            }
        }
    }

    /// Wait per the strategy and connect again
    async fn reopen(
        &self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        immediate: bool,
    ) -> Reopen {
        self.connection.start_reconnecting().await;
        let mut skip_delay = immediate;

        loop {
            let delay = if skip_delay {
                skip_delay = false;
                Duration::ZERO
            } else {
                match self.connection.next_reconnect_delay().await {
                    Some(delay) => delay,
                    None => {
                        tracing::error!(name = %self.name, "Reconnection abandoned");
                        return Reopen::GaveUp;
                    }
                }
            };

            tracing::info!(
                name = %self.name,
                delay_secs = delay.as_secs_f64(),
                "Reconnecting"
            );

            let wait = tokio::time::sleep(delay);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    _ = &mut wait => break,
                    command = commands.recv() => match command {
                        Some(Command::Send(_)) => {
                            tracing::debug!(name = %self.name, "Not connected, dropping outbound frame");
                        }
                        Some(Command::Reconnect) => break,
                        Some(Command::Stop) | None => return Reopen::Stopped,
                    }
                }
            }

            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => return Reopen::Connected(stream),
                Err(e) => {
                    tracing::warn!(name = %self.name, error = %e, "Reconnection failed");
                }
            }
        }
    }
}

#[async_trait]
impl DuplexTransport for WsTransport {
    fn on_reconnected(&self, handler: ReconnectedFn) {
        self.inner.handlers.add_reconnected(handler);
    }

    fn on_disconnected(&self, handler: DisconnectedFn) {
        self.inner.handlers.add_disconnected(handler);
    }

    fn on_message(&self, handler: MessageFn) {
        self.inner.handlers.add_message(handler);
    }

    fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Start the driver
    ///
    /// The first connection is attempted before returning. If it fails, the
    /// transport still counts as started and retries per its strategy; the
    /// reconnected handlers fire with `Initial` once it succeeds.
    #[tracing::instrument(skip(self), fields(name = %self.inner.name, url = %self.inner.url))]
    async fn start(&self) -> Result<()> {
        // Held until the driver is recorded, so stop() waits for us
        let mut driver = self.inner.driver.lock().await;

        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Transport already started");
            return Ok(());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        *self.inner.commands() = Some(sender);

        self.inner.connection.connecting().await;
        tracing::info!("Connecting to server");

        let first = match connect_async(self.inner.url.as_str()).await {
            Ok((stream, _)) => Some(stream),
            Err(e) => {
                tracing::warn!(error = %e, "Initial connection failed, will retry");
                None
            }
        };

        *driver = Some(tokio::spawn(self.inner.clone().run(first, receiver)));
        Ok(())
    }

    fn send(&self, text: String) -> Result<()> {
        self.inner.command(Command::Send(text))
    }

    async fn reconnect(&self) -> Result<()> {
        self.inner.command(Command::Reconnect)
    }

    async fn stop(&self) {
        // Waits out a start() that is still connecting
        let mut driver = self.inner.driver.lock().await;

        if self.inner.command(Command::Stop).is_err() {
            tracing::debug!(name = %self.inner.name, "Transport not running");
        }

        if let Some(handle) = driver.take() {
            let _ = handle.await;
        }
    }
}

/// Creates [`WsTransport`]s with shared settings
#[derive(Clone)]
pub struct WsConnector {
    name: String,
    idle_timeout: Option<Duration>,
    strategy: StrategyFactory,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            strategy: Arc::new(|| -> Box<dyn ReconnectionStrategy> {
                Box::new(FixedDelay::default())
            }),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyFactory) -> Self {
        self.strategy = strategy;
        self
    }

    /// Build an unstarted transport for `endpoint`
    pub fn transport(&self, endpoint: &Url) -> WsTransport {
        WsTransport::new(
            endpoint.clone(),
            self.name.clone(),
            self.idle_timeout,
            (self.strategy)(),
        )
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WsConnector {
    fn connect(&self, endpoint: &Url) -> Arc<dyn DuplexTransport> {
        Arc::new(self.transport(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::NoReconnect;

    async fn refused_url() -> Url {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("ws://{}/api/ws/events", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_send_before_start_is_connection_closed() {
        let transport = WsConnector::new().transport(&refused_url().await);

        assert!(!transport.is_started());
        assert!(matches!(
            transport.send("{}".to_string()),
            Err(Error::ConnectionClosed)
        ));
        assert!(transport.reconnect().await.is_err());
    }

    fn fixed(millis: u64) -> Box<dyn ReconnectionStrategy> {
        Box::new(FixedDelay::new(Duration::from_millis(millis)))
    }

    #[tokio::test]
    async fn test_failed_first_connect_gives_up_without_strategy() {
        let transport = WsTransport::new(refused_url().await, "test", None, Box::new(NoReconnect));
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.on_disconnected(Arc::new(move |reason: DisconnectReason| {
            let _ = tx.send(reason);
        }));

        transport.start().await.unwrap();

        let mut reasons = Vec::new();
        while let Ok(Some(reason)) =
            tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
        {
            reasons.push(reason);
            if reason == DisconnectReason::Exit {
                break;
            }
        }
        assert_eq!(reasons, vec![DisconnectReason::Error, DisconnectReason::Exit]);

        transport.stop().await;
        assert!(!transport.is_started());
        assert_eq!(transport.state().await, ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_failed_first_connect_keeps_retrying() {
        let transport = WsTransport::new(refused_url().await, "test", None, fixed(20));

        transport.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(transport.is_started());
        assert!(matches!(
            transport.state().await,
            ConnectionState::Reconnecting { .. }
        ));

        transport.stop().await;
        assert!(!transport.is_started());
        assert_eq!(transport.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stop_while_connecting_ends_driver() {
        // Accepts TCP, then hangs up mid-handshake after a moment
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}/api/ws/events", listener.local_addr().unwrap()))
            .unwrap();
        let accepted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    drop(socket);
                });
            }
        });

        let transport = WsTransport::new(url, "test", None, fixed(20));
        let starting = transport.clone();
        let start = tokio::spawn(async move { starting.start().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        transport.stop().await;
        start.await.unwrap().unwrap();

        assert!(!transport.is_started());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_harmless() {
        let transport = WsConnector::new().transport(&refused_url().await);
        transport.stop().await;
        transport.stop().await;
        assert!(!transport.is_started());
    }

    #[test]
    fn test_connector_defaults() {
        let connector = WsConnector::default();
        assert_eq!(connector.name, DEFAULT_NAME);
        assert_eq!(connector.idle_timeout, Some(DEFAULT_IDLE_TIMEOUT));
    }

    #[tokio::test]
    async fn test_connector_settings_reach_transport() {
        let url = refused_url().await;
        let transport = WsConnector::new()
            .with_name("dashboard")
            .with_idle_timeout(None)
            .with_strategy(Arc::new(|| -> Box<dyn ReconnectionStrategy> {
                Box::new(NoReconnect)
            }))
            .transport(&url);

        assert_eq!(transport.name(), "dashboard");
        assert_eq!(transport.url(), &url);
        assert_eq!(transport.inner.idle_timeout, None);
    }
}
