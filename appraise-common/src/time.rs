//! Timestamp and duration utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Placeholder rendered for a missing duration
pub const NO_DURATION: &str = "None";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Duration as fractional seconds
pub fn duration_to_seconds(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Format an elapsed time as `HH:MM:SS`, with `.ffffff` appended when the
/// duration has a sub-second part.
///
/// # Examples
///
/// ```
/// use appraise_common::time::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(83)), "00:01:23");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "00:00:01.500000");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let rem = secs % 60;
    let micros = duration.subsec_micros();
    if micros == 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, rem)
    } else {
        format!("{:02}:{:02}:{:02}.{:06}", hours, mins, rem, micros)
    }
}

/// Format an optional duration, using [`NO_DURATION`] when absent
pub fn format_optional_duration(duration: Option<Duration>) -> String {
    duration
        .map(format_duration)
        .unwrap_or_else(|| NO_DURATION.to_string())
}

/// Average of the given durations in seconds; zero when there are none
pub fn average_seconds<I>(durations: I) -> f64
where
    I: IntoIterator<Item = Duration>,
{
    let (total, count) = durations
        .into_iter()
        .fold((0.0, 0usize), |(total, count), d| (total + duration_to_seconds(d), count + 1));
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, Duration::from_secs(1));
    }

    #[test]
    fn test_format_duration_whole_seconds() {
        assert_eq!(format_duration(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_duration(Duration::from_secs(3661)), "01:01:01");
    }

    #[test]
    fn test_format_duration_with_fraction() {
        assert_eq!(format_duration(Duration::from_micros(2_000_250)), "00:00:02.000250");
    }

    #[test]
    fn test_format_optional_duration_placeholder() {
        assert_eq!(format_optional_duration(None), "None");
        assert_eq!(format_optional_duration(Some(Duration::from_secs(5))), "00:00:05");
    }

    #[test]
    fn test_average_seconds() {
        let durations = vec![Duration::from_secs(10), Duration::from_secs(20)];
        assert_eq!(average_seconds(durations), 15.0);
    }

    #[test]
    fn test_average_seconds_empty_is_zero() {
        assert_eq!(average_seconds(Vec::new()), 0.0);
    }
}
