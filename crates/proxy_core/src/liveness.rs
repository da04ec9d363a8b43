//! Liveness hysteresis counters.
//!
//! A single dropped probe must never flip the daemon into takeover mode,
//! so reachability is tracked with consecutive counters: a success zeroes
//! the failure streak and vice versa, and only a full streak of failures
//! marks the target as down.

/// Tracks consecutive probe outcomes against the configured threshold.
#[derive(Debug)]
pub struct LivenessTracker {
    threshold: u32,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl LivenessTracker {
    /// Creates a tracker; a threshold of zero is raised to one so the
    /// first failure still counts.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }

    /// Records a successful probe, zeroing the failure streak.
    pub fn record_success(&mut self) {
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    /// Records a failed probe, zeroing the success streak.
    ///
    /// Returns `true` once the failure streak reaches the threshold.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
        self.is_down()
    }

    /// Whether the failure streak has reached the threshold.
    pub fn is_down(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    /// Current consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_threshold_failures_required() {
        for threshold in [1u32, 2, 3, 10] {
            let mut tracker = LivenessTracker::new(threshold);
            for _ in 0..threshold - 1 {
                assert!(!tracker.record_failure(), "threshold {threshold}");
            }
            assert!(tracker.record_failure(), "threshold {threshold}");
        }
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut tracker = LivenessTracker::new(3);
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success();

        assert_eq!(tracker.failures(), 0);
        assert!(!tracker.is_down());

        // The full streak is required again from scratch.
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(tracker.record_failure());
    }

    #[test]
    fn test_zero_threshold_is_raised_to_one() {
        let mut tracker = LivenessTracker::new(0);
        assert!(tracker.record_failure());
    }

    #[test]
    fn test_failure_resets_success_streak() {
        let mut tracker = LivenessTracker::new(2);
        tracker.record_success();
        tracker.record_failure();
        tracker.record_success();
        assert_eq!(tracker.failures(), 0);
    }
}
