//! `lastUpdated` timestamps.
//!
//! Timestamps are UTC instants truncated to milliseconds, the precision
//! the persisted JSON and the remote store carry. Every local write moves
//! the stamp strictly forward even when the wall clock has not advanced.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};

/// Returns the current time truncated to milliseconds.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Returns a stamp strictly later than `previous`.
///
/// Uses the wall clock when it is ahead of `previous`, otherwise bumps
/// `previous` by one millisecond.
#[must_use]
pub fn advance(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now();
    match previous {
        Some(prev) if now <= prev => prev.trunc_subsecs(3) + TimeDelta::milliseconds(1),
        _ => now,
    }
}

/// Milliseconds since the Unix epoch, as carried by broadcast envelopes.
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}
