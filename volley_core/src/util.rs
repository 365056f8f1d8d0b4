//! Common time helpers for volley_core.

use chrono::{DateTime, FixedOffset, Local, SecondsFormat, TimeDelta, Utc};
use std::time::Duration;

/// Number of microseconds in one millisecond.
pub const MICROS_PER_MILLI: f64 = 1_000.0;

/// Convert fractional milliseconds to a signed delta at microsecond resolution.
/// Non-finite input maps to zero.
#[inline]
pub fn millis_to_delta(ms: f64) -> TimeDelta {
    if !ms.is_finite() {
        return TimeDelta::zero();
    }
    TimeDelta::microseconds((ms * MICROS_PER_MILLI).round() as i64)
}

/// Span in whole milliseconds from the first to the last send of a wave.
/// - `count` of 0 or 1 yields 0.
#[inline]
pub fn wave_duration_ms(count: u32, stagger: Duration) -> u64 {
    let stagger_ms = u64::try_from(stagger.as_millis()).unwrap_or(u64::MAX);
    u64::from(count.saturating_sub(1)).saturating_mul(stagger_ms)
}

/// RFC 3339 rendering with millisecond precision in the given civil zone.
#[inline]
pub fn in_zone(instant: DateTime<Utc>, zone: FixedOffset) -> String {
    instant
        .with_timezone(&zone)
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// RFC 3339 rendering in UTC.
#[inline]
pub fn in_utc(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// RFC 3339 rendering in the machine's local civil zone.
#[inline]
pub fn in_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}
