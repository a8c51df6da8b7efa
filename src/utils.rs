//! # Formatting Helpers
//!
//! Small formatters shared by ingest, export and the command-line binary.
//!
//! - **Bytes**: human-readable sizes for the RAM spec string
//! - **Spec strings**: character-safe truncation to the stored maximum
//! - **Samples**: decimal rendering of stored floats for CSV export
//! - **Durations**: elapsed-time display in CLI log lines
//!
//! ```rust
//! use benchmark_data_engine::utils::*;
//!
//! assert_eq!(format_bytes(16_000_000 * 1024), "15 GB");
//! assert_eq!(format_sample(60.0), "60");
//! assert_eq!(format_sample(16.67), "16.67");
//! ```

use crate::defaults::MAX_STRING_LENGTH;
use std::time::Duration;

const BYTE_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Format a byte count in a human-readable way
///
/// Uses binary (1024-based) scaling with one significant decimal below 10
/// units and none above, e.g. "512 B", "8.0 GB", "15 GB". The unit names are
/// the ones the export path parses back into kilobytes, so a value formatted
/// here converts back to the same string after a round trip.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 10.0 + 0.5).floor() / 10.0;
    if rounded < 10.0 {
        format!("{:.1} {}", rounded, BYTE_UNITS[unit])
    } else {
        format!("{:.0} {}", rounded, BYTE_UNITS[unit])
    }
}

/// Truncate a spec string to [`MAX_STRING_LENGTH`] characters
///
/// Longer strings are cut on a character boundary and get "…" appended.
pub fn truncate_spec(value: &str) -> String {
    match value.char_indices().nth(MAX_STRING_LENGTH) {
        Some((cut, _)) => format!("{}…", &value[..cut]),
        None => value.to_string(),
    }
}

/// Render a stored sample as CSV text
///
/// Produces the shortest decimal that parses back to the same value, never
/// in exponent form and without trailing zeros ("60", "16.67", "0.00001").
pub fn format_sample(value: f64) -> String {
    value.to_string()
}

/// Format a duration in a human-readable way
///
/// Sub-second durations use milliseconds with two decimals, longer ones
/// seconds, minutes and hours.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_secs_f64() * 1_000.0;

    if total_ms < 1_000.0 {
        format!("{:.2}ms", total_ms)
    } else if duration.as_secs() < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            format!("{}h {}m {}s", minutes / 60, minutes % 60, remaining_seconds)
        }
    }
}
