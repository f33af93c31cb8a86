//! Connection state of one WebSocket transport
//!
//! ```text
//! Disconnected → Connecting → Connected ⇄ Reconnecting { attempt }
//!                     ↓                          ↓
//!                   Failed  ←────────────────────┘
//! ```
//!
//! The manager pairs the state with the transport's reconnection strategy,
//! so "what attempt is this" and "how long to wait" are answered in one
//! place.

use crate::reconnect::ReconnectionStrategy;
use tokio::sync::{Mutex, RwLock};

/// Lifecycle state of a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, or stopped
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Socket is open
    Connected,
    /// Connection lost; `attempt` reconnects tried so far
    Reconnecting { attempt: u32 },
    /// The strategy gave up
    Failed,
}

/// Tracks state and consults the reconnection strategy
pub struct ConnectionManager {
    state: RwLock<ConnectionState>,
    strategy: Mutex<Box<dyn ReconnectionStrategy>>,
}

impl ConnectionManager {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            strategy: Mutex::new(strategy),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    pub async fn connecting(&self) {
        self.set_state(ConnectionState::Connecting).await;
    }

    /// Mark connected and reset the strategy for the next outage
    pub async fn connected(&self) {
        self.set_state(ConnectionState::Connected).await;
        self.strategy.lock().await.reset();
    }

    pub async fn disconnected(&self) {
        self.set_state(ConnectionState::Disconnected).await;
    }

    pub async fn start_reconnecting(&self) {
        self.set_state(ConnectionState::Reconnecting { attempt: 0 })
            .await;
    }

    /// Delay before the next attempt, advancing the attempt counter
    ///
    /// Returns `None` and moves to `Failed` once the strategy gives up.
    pub async fn next_reconnect_delay(&self) -> Option<std::time::Duration> {
        let attempt = match self.state().await {
            ConnectionState::Reconnecting { attempt } => attempt,
            _ => 0,
        };

        let delay = self.strategy.lock().await.next_delay(attempt);

        match delay {
            Some(_) => {
                self.set_state(ConnectionState::Reconnecting {
                    attempt: attempt + 1,
                })
                .await
            }
            None => self.set_state(ConnectionState::Failed).await,
        }

        delay
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }
}
