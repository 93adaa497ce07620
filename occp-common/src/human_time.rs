//! Human-readable relative time formatting
//!
//! Used by status surfaces to render "time since last sync" style fields.

use chrono::{DateTime, Utc};

/// Below this many seconds an event reads as "just now"
const JUST_NOW_MAX: i64 = 5;
const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Format an elapsed number of seconds as a short relative phrase.
///
/// Picks the largest whole unit:
/// - `< 5s` → `just now`
/// - `< 60s` → `Ns ago`
/// - `< 60m` → `Nm ago`
/// - `< 24h` → `Nh ago`
/// - otherwise `Nd ago`
///
/// Negative input (clock skew) reads as `just now`.
///
/// # Examples
///
/// ```
/// use occp_common::human_time::format_elapsed;
///
/// assert_eq!(format_elapsed(2), "just now");
/// assert_eq!(format_elapsed(42), "42s ago");
/// assert_eq!(format_elapsed(330), "5m ago");
/// assert_eq!(format_elapsed(7200), "2h ago");
/// assert_eq!(format_elapsed(200_000), "2d ago");
/// ```
pub fn format_elapsed(seconds: i64) -> String {
    if seconds < JUST_NOW_MAX {
        "just now".to_string()
    } else if seconds < MINUTE {
        format!("{}s ago", seconds)
    } else if seconds < HOUR {
        format!("{}m ago", seconds / MINUTE)
    } else if seconds < DAY {
        format!("{}h ago", seconds / HOUR)
    } else {
        format!("{}d ago", seconds / DAY)
    }
}

/// Relative time since `last`, or `never` when there is no timestamp
pub fn format_time_since(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match last {
        Some(at) => format_elapsed(now.signed_duration_since(at).num_seconds()),
        None => "never".to_string(),
    }
}
