//! Timestamp resolution for export and detail payloads.
//!
//! The export feed mixes ISO strings, Unix seconds and Unix milliseconds in
//! the same columns, so every dating decision funnels through [`resolve_date`].

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Unix values above this are milliseconds; between [`SECONDS_FLOOR`] and this,
/// seconds; anything smaller is noise (the export uses 0 for "never").
pub const MILLIS_THRESHOLD: f64 = 10_000_000_000.0;
pub const SECONDS_FLOOR: f64 = 1_000_000_000.0;

static ISO_DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("iso prefix pattern"));

/// Resolve a raw timestamp value to a UTC calendar date.
///
/// Accepts ISO-like strings (`2025-11-12T00:00:00Z`), Unix seconds and Unix
/// milliseconds. Returns `None` for blanks, the `"0"` placeholder, and values
/// too small to be a plausible Unix time.
pub fn resolve_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0" {
        return None;
    }

    if raw.contains('-') && raw.len() >= 10 {
        if let Some(caps) = ISO_DATE_PREFIX.captures(raw) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }

    let value: f64 = raw.parse().ok()?;
    if value <= 0.0 {
        return None;
    }

    let seconds = if value > MILLIS_THRESHOLD {
        (value / 1000.0) as i64
    } else if value > SECONDS_FLOOR {
        value as i64
    } else {
        return None;
    };

    DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

/// Resolve a bare Unix-seconds value, as returned by the conversation detail
/// endpoint's `created_at` fields.
pub fn resolve_unix_seconds(seconds: i64) -> Option<NaiveDate> {
    if seconds <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}
