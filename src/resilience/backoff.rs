//! Exponential backoff with jitter between failover attempts.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `retry` (1-based; 0 means no delay).
///
/// Doubles from `base_ms`, is capped at `max_ms`, then gets up to 10% jitter
/// so concurrent clients do not hammer a recovering server in lockstep.
pub fn calculate_backoff(retry: u32, base_ms: u64, max_ms: u64) -> Duration {
    if retry == 0 || base_ms == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(retry - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);
        assert_eq!(calculate_backoff(3, 0, 2000), Duration::ZERO);
    }

    #[test]
    fn test_doubles_until_cap() {
        let first = calculate_backoff(1, 100, 2000).as_millis();
        assert!((100..110).contains(&first));

        let third = calculate_backoff(3, 100, 2000).as_millis();
        assert!((400..440).contains(&third));

        let capped = calculate_backoff(30, 100, 1000).as_millis();
        assert!((1000..1100).contains(&capped));
    }
}
