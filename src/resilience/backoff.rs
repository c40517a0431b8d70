//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is 1-based; attempt 0 waits nothing. The delay before jitter is
/// `base_ms * 2^(attempt-1)`, capped at `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let capped_delay = backoff_ceiling(attempt, base_ms, max_ms);

    // Apply jitter (0 to 10% of the delay), never past the cap
    let jitter_range = (capped_delay / 10).min(max_ms.saturating_sub(capped_delay));
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay for `attempt` before jitter.
pub fn backoff_ceiling(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    base_ms.saturating_mul(exponential_base).min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 1000, 8000);
        assert!(b1.as_millis() >= 1000 && b1.as_millis() < 1100);

        let b2 = calculate_backoff(2, 1000, 8000);
        assert!(b2.as_millis() >= 2000);

        let max = calculate_backoff(10, 1000, 8000);
        assert_eq!(max.as_millis(), 8000);
    }

    #[test]
    fn test_ceiling_sequence() {
        let delays: Vec<u64> = (1..=5).map(|a| backoff_ceiling(a, 1000, 8000)).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 8000]);
        assert_eq!(backoff_ceiling(0, 1000, 8000), 0);
    }
}
