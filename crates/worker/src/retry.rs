//! Capped exponential backoff with full jitter for the delivery retry schedule.

use webhook_common::Jitter;

/// Delay in whole seconds before the next dispatch of a delivery whose
/// `n`-th attempt (1-based) just failed.
///
/// `delay(n) = min(cap, base * 2^(n-1)) * (1 + jitter)`, `jitter` drawn from
/// `[-0.5, 0.5)`, rounded to the nearest second.
pub fn calculate_backoff(n: u32, base_secs: u64, cap_secs: u64, jitter: &dyn Jitter) -> u64 {
    let exponential = base_secs.saturating_mul(2u64.saturating_pow(n.saturating_sub(1)));
    let nominal = exponential.min(cap_secs);
    let factor = 1.0 + jitter.sample();
    ((nominal as f64) * factor).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use webhook_common::FixedJitter;

    #[test]
    fn test_first_attempt_is_base_delay() {
        let jitter = FixedJitter(0.0);
        assert_eq!(calculate_backoff(1, 10, 900, &jitter), 10);
    }

    #[test]
    fn test_doubles_each_attempt() {
        let jitter = FixedJitter(0.0);
        assert_eq!(calculate_backoff(1, 10, 900, &jitter), 10);
        assert_eq!(calculate_backoff(2, 10, 900, &jitter), 20);
        assert_eq!(calculate_backoff(3, 10, 900, &jitter), 40);
        assert_eq!(calculate_backoff(4, 10, 900, &jitter), 80);
        assert_eq!(calculate_backoff(5, 10, 900, &jitter), 160);
    }

    #[test]
    fn test_never_exceeds_cap() {
        let jitter = FixedJitter(0.0);
        assert_eq!(calculate_backoff(10, 10, 900, &jitter), 900);
        assert_eq!(calculate_backoff(20, 10, 900, &jitter), 900);
    }

    #[test]
    fn test_jitter_scales_nominal_delay() {
        let low = FixedJitter(-0.5);
        let high = FixedJitter(0.499);
        assert_eq!(calculate_backoff(2, 10, 900, &low), 10); // 20 * 0.5
        assert_eq!(calculate_backoff(2, 10, 900, &high), 30); // 20 * 1.499, rounded
    }

    #[test]
    fn test_jitter_stays_within_half_to_one_and_a_half_of_nominal() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let sample = rng.gen_range(-0.5..0.5);
            let jitter = FixedJitter(sample);
            let delay = calculate_backoff(3, 10, 900, &jitter) as f64;
            assert!(delay >= 20.0 && delay < 60.0, "delay {delay} out of bounds for nominal 40");
        }
    }
}
