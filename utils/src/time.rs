//! Time formatting helpers.

use tws_types::Timestamp;

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3_599 => format!("{}m {}s", secs / 60, secs % 60),
        3_600..=86_399 => format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60),
        _ => format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3_600),
    }
}

/// Seconds left before the pool may be sanitised again (0 when open).
///
/// A pool with no recorded sanitisation is always open.
pub fn time_until_next_sanitise(last: Option<Timestamp>, interval_secs: u64, now: Timestamp) -> u64 {
    match last {
        Some(last) => interval_secs.saturating_sub(last.elapsed_since(now)),
        None => 0,
    }
}
