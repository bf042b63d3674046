//! Reconnect cadence.

use std::time::Duration;

use rand::Rng;

/// Delay before the next connection attempt: the fixed interval plus a
/// random extra in `[0, jitter)`. A jitter below one millisecond adds
/// nothing.
pub fn reconnect_delay(interval: Duration, jitter: Duration) -> Duration {
    let jitter_ms = jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return interval;
    }

    let extra = rand::thread_rng().gen_range(0..jitter_ms);
    interval + Duration::from_millis(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_jitter_is_fixed_cadence() {
        let interval = Duration::from_secs(10);
        for _ in 0..10 {
            assert_eq!(reconnect_delay(interval, Duration::ZERO), interval);
        }
        assert_eq!(reconnect_delay(interval, Duration::from_micros(500)), interval);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let interval = Duration::from_millis(100);
        let jitter = Duration::from_millis(50);
        for _ in 0..100 {
            let delay = reconnect_delay(interval, jitter);
            assert!(delay >= interval);
            assert!(delay < interval + jitter);
        }
    }
}
