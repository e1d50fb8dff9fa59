//! Wall-clock helpers
//!
//! Records and payloads timestamp status changes in Unix milliseconds;
//! these helpers keep that representation in one place.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds.
///
/// # Panics
/// Panics if the system clock reads before the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_millis() as u64
}

/// Milliseconds elapsed since a Unix-millis timestamp, 0 for future times.
pub fn elapsed_millis(since: u64) -> u64 {
    current_time_millis().saturating_sub(since)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_current_time_millis_is_positive() {
        assert!(current_time_millis() > 0);
    }

    #[test]
    fn test_elapsed_millis() {
        let now = current_time_millis();
        std::thread::sleep(Duration::from_millis(10));
        assert!(elapsed_millis(now) >= 10);
    }

    #[test]
    fn test_elapsed_millis_future_time() {
        assert_eq!(elapsed_millis(current_time_millis() + 1_000_000), 0);
    }
}
