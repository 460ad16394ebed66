//! Unlock backoff ladder (spec C5).
//!
//! The ladder itself is pure logic, grounded on
//! `original_source/.../app/routes/vault.py`'s unlock handler; persistence
//! of the throttle row lives in [`crate::store`].

use chrono::{DateTime, Utc};

/// `2^min(failed_attempts, 8)` seconds, capped at 300s.
pub fn backoff_seconds(failed_attempts: u32) -> i64 {
    let exponent = failed_attempts.min(8);
    (1i64 << exponent).min(300)
}

pub fn next_allowed_at(now: DateTime<Utc>, failed_attempts: u32) -> DateTime<Utc> {
    now + chrono::Duration::seconds(backoff_seconds(failed_attempts))
}

pub fn retry_after_seconds(now: DateTime<Utc>, next_allowed_at: DateTime<Utc>) -> i64 {
    (next_allowed_at - now).num_seconds().max(1)
}
