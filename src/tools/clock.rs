//! Wall-clock accessors and timestamp rendering.

use chrono::{Local, LocalResult, TimeZone, Utc};

/// Seconds since the Unix epoch.
pub fn now_utc_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Milliseconds since the Unix epoch.
pub fn now_utc_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render an epoch instant as UTC, e.g. `2026-08-01 13:45:02`.
pub fn format_utc(epoch: i64) -> String {
    match Utc.timestamp_opt(epoch, 0) {
        LocalResult::Single(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("<out-of-range epoch {}>", epoch),
    }
}

/// Render an epoch instant in the local timezone.
pub fn format_local(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0) {
        LocalResult::Single(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        LocalResult::Ambiguous(t, _) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        LocalResult::None => format!("<out-of-range epoch {}>", epoch),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn utc_rendering() {
        assert_eq!(format_utc(0), "1970-01-01 00:00:00");
        assert_eq!(format_utc(1_600_000_000), "2020-09-13 12:26:40");
    }

    #[test]
    fn clock_is_monotonic_enough() {
        let s = now_utc_seconds();
        let ms = now_utc_millis();
        assert!(ms / 1000 >= s - 1);
        assert!(s > 1_600_000_000);
    }
}
