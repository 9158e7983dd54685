//! Shared clock helpers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds.
#[inline]
pub fn now_ms() -> u64 {
    system_time_ms(SystemTime::now())
}

/// Convert a `SystemTime` to Unix milliseconds, saturating at zero for
/// times before the epoch.
pub fn system_time_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Age of `time` relative to now. Times in the future have age zero.
pub fn age_of(time: SystemTime) -> Duration {
    SystemTime::now().duration_since(time).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_age_of_future_time_is_zero() {
        let future = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(age_of(future), Duration::ZERO);
    }

    #[test]
    fn test_system_time_ms_before_epoch_saturates() {
        let before = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(system_time_ms(before), 0);
    }
}
