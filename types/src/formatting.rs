//! Centralized number formatting utilities.
//!
//! All cooldown-board display formatting goes through this module so every
//! renderer shows identical strings, and to support European-style number
//! formatting (swapping `.` and `,`).

/// Apply European number format by swapping `.` and `,` in a formatted string.
fn europeanize(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '.' => result.push(','),
            ',' => result.push('.'),
            _ => result.push(c),
        }
    }
    result
}

/// Apply European formatting conditionally.
#[inline]
fn maybe_eu(s: String, european: bool) -> String {
    if european { europeanize(&s) } else { s }
}

/// Format a remaining-time countdown for a cooldown bar.
///
/// - At or below zero: `"0.0"`
/// - Below one minute: tenths of a second, `"12.4"`
/// - One minute and up: `"M:SS"`
///
/// # Examples
/// ```
/// use kickwatch_types::formatting::format_countdown;
/// assert_eq!(format_countdown(-0.3, false), "0.0");
/// assert_eq!(format_countdown(12.44, false), "12.4");
/// assert_eq!(format_countdown(12.44, true), "12,4");
/// assert_eq!(format_countdown(75.2, false), "1:15");
/// ```
pub fn format_countdown(remaining_secs: f32, european: bool) -> String {
    if remaining_secs <= 0.0 {
        return maybe_eu("0.0".to_string(), european);
    }
    let s = if remaining_secs < 60.0 {
        format!("{:.1}", remaining_secs)
    } else {
        let total = remaining_secs as u32;
        format!("{}:{:02}", total / 60, total % 60)
    };
    maybe_eu(s, european)
}

/// Format a whole-second cooldown length for labels, e.g. `"24s"` / `"1m30s"`.
///
/// # Examples
/// ```
/// use kickwatch_types::formatting::format_cooldown_label;
/// assert_eq!(format_cooldown_label(24.0), "24s");
/// assert_eq!(format_cooldown_label(90.0), "1m30s");
/// assert_eq!(format_cooldown_label(120.0), "2m");
/// ```
pub fn format_cooldown_label(duration_secs: f32) -> String {
    let total = duration_secs.round() as u32;
    if total < 60 {
        return format!("{}s", total);
    }
    let (mins, secs) = (total / 60, total % 60);
    if secs == 0 {
        format!("{}m", mins)
    } else {
        format!("{}m{}s", mins, secs)
    }
}
