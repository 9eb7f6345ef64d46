use rand::Rng;
use std::time::Duration;

/// Computes the delay before a retry attempt: an exponential ramp from `base`
/// capped at `cap`, with equal jitter (half the capped value is fixed, half is
/// drawn uniformly at random).
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    base: Duration,
    cap: Duration,
}

impl BackoffCalculator {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self.base.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exponential.min(self.cap);

        let half = capped / 2;
        if half.is_zero() {
            return capped;
        }
        let jitter = rand::thread_rng().gen_range(0..=half.as_nanos() as u64);
        half + Duration::from_nanos(jitter)
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::BackoffCalculator;
    use std::time::Duration;

    #[test]
    fn delay_stays_within_jitter_window() {
        let calc = BackoffCalculator::new(Duration::from_millis(100), Duration::from_secs(60));
        for attempt in 0..8 {
            let exponential = Duration::from_millis(100 * 2u64.pow(attempt));
            let capped = exponential.min(Duration::from_secs(60));
            for _ in 0..32 {
                let delay = calc.delay_for_attempt(attempt);
                assert!(delay >= capped / 2, "attempt {attempt}: {delay:?} too small");
                assert!(delay <= capped, "attempt {attempt}: {delay:?} too large");
            }
        }
    }

    #[test]
    fn cap_bounds_large_attempt_counts() {
        let calc = BackoffCalculator::new(Duration::from_millis(100), Duration::from_secs(60));
        let delay = calc.delay_for_attempt(1000);
        assert!(delay <= Duration::from_secs(60));
        assert!(delay >= Duration::from_secs(30));
    }
}
