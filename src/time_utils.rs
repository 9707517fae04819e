// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and time-derived ids.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Millisecond timestamp id, strictly greater than `newest_existing`.
///
/// Collection ids double as creation times, so two collections created in the
/// same millisecond still get distinct, increasing ids.
pub fn next_collection_id(now: DateTime<Utc>, newest_existing: Option<u64>) -> u64 {
    let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    match newest_existing {
        Some(newest) => now_ms.max(newest.saturating_add(1)),
        None => now_ms,
    }
}
