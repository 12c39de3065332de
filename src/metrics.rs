//! Metric helpers for `brokerwire`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open sessions.
pub const SESSIONS_ACTIVE: &str = "brokerwire_sessions_active";
/// Name of the counter tracking messages queued for a consumer.
pub const MESSAGES_DISPATCHED: &str = "brokerwire_messages_dispatched_total";
/// Name of the counter tracking messages discarded because they expired.
pub const MESSAGES_EXPIRED: &str = "brokerwire_messages_expired_total";
/// Name of the counter tracking messages put back for redelivery.
pub const MESSAGES_REDELIVERED: &str = "brokerwire_messages_redelivered_total";
/// Name of the counter tracking dropped, unresolvable inbound commands.
pub const PROTOCOL_VIOLATIONS: &str = "brokerwire_protocol_violations_total";

/// Increment the open sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the open sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Record a message queued for a consumer.
pub fn inc_dispatched() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_DISPATCHED).increment(1);
}

/// Record an expired message discarded before delivery.
pub fn inc_expired() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_EXPIRED).increment(1);
}

/// Record `count` messages put back for redelivery.
pub fn inc_redelivered(count: u64) {
    #[cfg(feature = "metrics")]
    if count > 0 {
        counter!(MESSAGES_REDELIVERED).increment(count);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a dropped protocol violation.
pub fn inc_protocol_violations() {
    #[cfg(feature = "metrics")]
    counter!(PROTOCOL_VIOLATIONS).increment(1);
}
