//! Wall-clock helpers.

use chrono::Utc;

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Human-readable countdown ("1h 05m", "4m 10s") until `target_ms`.
pub fn format_countdown(target_ms: i64, now_ms: i64) -> String {
    let remaining = target_ms.saturating_sub(now_ms).max(0) / 1000;
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m {:02}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(3_900_000, 0), "1h 05m");
        assert_eq!(format_countdown(250_000, 0), "4m 10s");
        assert_eq!(format_countdown(0, 10_000), "0m 00s");
    }

    #[test]
    fn test_format_countdown_extreme_inputs() {
        assert_eq!(format_countdown(i64::MIN, 1_000), "0m 00s");
        assert!(format_countdown(i64::MAX, i64::MIN).ends_with('m'));
    }
}
