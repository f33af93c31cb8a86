//! Known event topics
//!
//! Every call builds a new [`Subscription`] with fresh correlation ids, so
//! calling `nearby` twice gives two independent subscriptions.

use sauce_core::{wire, CorrelationIds, Result, Subscription};

pub const WATCHING: &str = "athlete/watching";
pub const GROUPS: &str = "groups";
pub const NEARBY: &str = "nearby";
pub const CHAT: &str = "chat";
pub const RIDEON: &str = "rideon";

/// State of the athlete being watched
pub fn watching(ids: &CorrelationIds, persistent: bool) -> Result<Subscription> {
    wire::build_subscribe(ids, WATCHING, persistent)
}

pub fn groups(ids: &CorrelationIds) -> Result<Subscription> {
    wire::build_subscribe(ids, GROUPS, false)
}

pub fn nearby(ids: &CorrelationIds) -> Result<Subscription> {
    wire::build_subscribe(ids, NEARBY, false)
}

/// Chat is always requested as persistent
pub fn chat(ids: &CorrelationIds) -> Result<Subscription> {
    wire::build_subscribe(ids, CHAT, true)
}

pub fn rideon(ids: &CorrelationIds) -> Result<Subscription> {
    wire::build_subscribe(ids, RIDEON, false)
}
