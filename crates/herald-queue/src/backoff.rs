// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry backoff computation.

use std::time::Duration;

use rand::Rng;

/// Upper bound on jitter as a fraction of the exponential delay.
const MAX_JITTER_FRACTION: f64 = 0.10;

/// Cap on the exponent so pathological attempt counts cannot overflow.
const MAX_EXPONENT: u32 = 20;

/// Delay before retry `n` (1-based): `base * 2^(n-1)` plus a bounded
/// random jitter of at most 10% of the exponential delay.
pub fn retry_delay(retry: u32, base_ms: u64) -> Duration {
    let exponent = retry.saturating_sub(1).min(MAX_EXPONENT);
    let exponential = base_ms.saturating_mul(1u64 << exponent);
    let jitter = (exponential as f64 * rand::thread_rng().gen_range(0.0..MAX_JITTER_FRACTION))
        as u64;
    Duration::from_millis(exponential.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_jitter_band() {
        // For attempt n, the delay must lie in [base*2^(n-1), base*2^(n-1)*1.1].
        for retry in 1..=6u32 {
            let base = 1000u64;
            let floor = base * 2u64.pow(retry - 1);
            let ceiling = (floor as f64 * 1.1) as u64;
            for _ in 0..100 {
                let delay = retry_delay(retry, base).as_millis() as u64;
                assert!(
                    (floor..=ceiling).contains(&delay),
                    "retry {retry}: delay {delay} outside [{floor}, {ceiling}]"
                );
            }
        }
    }

    #[test]
    fn first_three_retries_double() {
        // base 1000 -> approx 1000, 2000, 4000 (plus <=10% jitter).
        assert!((1000..=1100).contains(&(retry_delay(1, 1000).as_millis() as u64)));
        assert!((2000..=2200).contains(&(retry_delay(2, 1000).as_millis() as u64)));
        assert!((4000..=4400).contains(&(retry_delay(3, 1000).as_millis() as u64)));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let delay = retry_delay(u32::MAX, u64::MAX / 2);
        assert!(delay.as_millis() > 0);
    }
}
