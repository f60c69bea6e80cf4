//! Reconnection backoff calculation.
//!
//! The schedule is plain capped exponential backoff:
//! `min(base_delay * 2^retry, max_delay)`. No jitter — the first retry after
//! a drop always waits exactly the base delay, which keeps the schedule
//! deterministic and testable.

/// Delay in milliseconds before reconnect attempt `retry` (zero-based).
///
/// The sequence is non-decreasing, starts at `base_delay_ms`, and never
/// exceeds `max_delay_ms`. The shift is clamped so large retry counts cannot
/// overflow.
#[must_use]
pub fn reconnect_delay(retry: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << retry.min(31))
        .min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_delay_equals_base() {
        assert_eq!(reconnect_delay(0, 1000, 30_000), 1000);
    }

    #[test]
    fn doubles_until_cap() {
        assert_eq!(reconnect_delay(1, 1000, 30_000), 2000);
        assert_eq!(reconnect_delay(2, 1000, 30_000), 4000);
        assert_eq!(reconnect_delay(3, 1000, 30_000), 8000);
        assert_eq!(reconnect_delay(4, 1000, 30_000), 16_000);
    }

    #[test]
    fn caps_at_max() {
        assert_eq!(reconnect_delay(5, 1000, 30_000), 30_000);
        assert_eq!(reconnect_delay(20, 1000, 30_000), 30_000);
    }

    #[test]
    fn high_retry_no_overflow() {
        assert_eq!(reconnect_delay(200, u64::MAX / 2, u64::MAX), u64::MAX);
    }

    proptest! {
        #[test]
        fn schedule_is_monotonic_and_bounded(
            base in 1u64..10_000,
            cap_factor in 1u64..64,
            retries in 1u32..24,
        ) {
            let max = base * cap_factor;
            let delays: Vec<u64> = (0..retries)
                .map(|r| reconnect_delay(r, base, max))
                .collect();

            prop_assert_eq!(delays[0], base.min(max));
            for pair in delays.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            for delay in delays {
                prop_assert!(delay >= base.min(max));
                prop_assert!(delay <= max);
            }
        }
    }
}
