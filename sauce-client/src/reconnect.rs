//! Reconnection timing for the WebSocket transport
//!
//! The session layer never schedules reconnects itself; it only reacts to
//! the transport saying "connected again". The transport asks a
//! `ReconnectionStrategy` how long to wait between attempts and when to give
//! up.
//!
//! # Built-in Strategies
//!
//! - **FixedDelay**: the same pause every time (the client default: 10 s,
//!   unlimited attempts)
//! - **ExponentialBackoff**: doubling pauses up to a cap, optional jitter
//! - **NoReconnect**: give up as soon as the connection drops
//!
//! ```rust
//! use sauce_client::{ExponentialBackoff, FixedDelay};
//! use std::time::Duration;
//!
//! let steady = FixedDelay::new(Duration::from_secs(10));
//! let backoff = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(30))
//!     .with_max_attempts(20)
//!     .with_jitter();
//! ```

use std::time::Duration;

/// Decides the pause before each reconnection attempt
///
/// `reset()` is called once a connection is re-established so the next
/// outage starts from attempt 0 again.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before attempt number `attempt` (0-based), or `None` to give up
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Forget accumulated state after a successful reconnect
    fn reset(&mut self);
}

/// Exponentially growing delays with an optional attempt limit
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Start at `min_delay`, double per attempt, never exceed `max_delay`
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
            current_attempt: 0,
        }
    }

    /// Give up after this many attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random extra delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30)).with_jitter()
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.current_attempt = attempt;

        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let base_delay = (self.min_delay.as_millis() as u64).saturating_mul(factor);
        let delay = base_delay.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            use rand::Rng;
            let jitter_ms = rand::thread_rng().gen_range(0..=(delay / 4));
            return Some(Duration::from_millis(delay + jitter_ms));
        }

        Some(Duration::from_millis(delay))
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// The same delay before every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Wait `delay` before every attempt, forever
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after this many attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }

    fn reset(&mut self) {}
}

/// Never reconnect
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
