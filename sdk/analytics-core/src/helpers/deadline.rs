use std::time::{Duration, Instant};

/// Tracks an absolute wall-time bound derived from a caller timeout.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    duration: Duration,
}

impl Deadline {
    pub fn of(duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            duration,
        }
    }

    /// Time left before the deadline, or `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let remaining = self.duration.checked_sub(self.start.elapsed())?;
        if remaining.is_zero() {
            None
        } else {
            Some(remaining)
        }
    }

    pub fn has_remaining(&self, duration: Duration) -> bool {
        self.remaining().unwrap_or(Duration::ZERO) >= duration
    }

    pub fn exceeded(&self) -> bool {
        self.remaining().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::Deadline;
    use std::time::Duration;

    #[test]
    fn remaining_counts_down() {
        let deadline = Deadline::of(Duration::from_secs(60));
        let remaining = deadline.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));
        assert!(!deadline.exceeded());
    }

    #[test]
    fn zero_duration_is_exceeded() {
        let deadline = Deadline::of(Duration::ZERO);
        assert!(deadline.exceeded());
        assert_eq!(deadline.remaining(), None);
        assert!(!deadline.has_remaining(Duration::from_millis(1)));
    }

    #[test]
    fn has_remaining_compares_against_budget() {
        let deadline = Deadline::of(Duration::from_secs(60));
        assert!(deadline.has_remaining(Duration::from_secs(1)));
        assert!(!deadline.has_remaining(Duration::from_secs(61)));
    }
}
