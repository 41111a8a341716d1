//! Timestamp utilities
//!
//! Timestamps are persisted as INTEGER milliseconds since the Unix epoch.

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Timestamp `days` days before now
pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

/// Encode a timestamp for storage
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Decode a stored timestamp, falling back to the epoch for out-of-range values
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_days_ago_is_in_the_past() {
        let thirty = days_ago(30);
        let diff = now() - thirty;
        assert!(diff.num_days() >= 29 && diff.num_days() <= 30);
    }

    #[test]
    fn test_millis_conversion_is_exact() {
        let ts = from_millis(1_730_000_000_123);
        assert_eq!(to_millis(ts), 1_730_000_000_123);
    }

    #[test]
    fn test_from_millis_out_of_range_falls_back_to_epoch() {
        assert_eq!(from_millis(i64::MAX).timestamp(), 0);
    }
}
