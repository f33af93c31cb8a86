//! Correlation identifiers
//!
//! Every subscribe, unsubscribe and call frame carries a `uid`, and every
//! subscription a `subId`. Both are drawn from one shared counter so that no
//! two frames sent by this process ever reuse a value.
//!
//! The counter is an ordinary value owned by whoever composes the client and
//! handed out as `Arc<CorrelationIds>`; there is no hidden global.
//!
//! # Seeding
//!
//! The first id is derived from the wall clock, so two processes started at
//! different moments are unlikely to overlap. Uniqueness is only promised
//! within one counter, which is enough because the service correlates ids
//! per connection.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide source of correlation ids
#[derive(Debug)]
pub struct CorrelationIds {
    last: AtomicI64,
}

impl CorrelationIds {
    /// Create a counter seeded from the current time
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);

        Self::starting_at(seed.checked_abs().unwrap_or(0))
    }

    /// Create a counter whose first id is `seed + 1`
    pub fn starting_at(seed: i64) -> Self {
        Self {
            last: AtomicI64::new(seed),
        }
    }

    /// Allocate the next id
    pub fn next_id(&self) -> i64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently allocated id (or the seed if none was allocated)
    pub fn last_id(&self) -> i64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for CorrelationIds {
    fn default() -> Self {
        Self::new()
    }
}
