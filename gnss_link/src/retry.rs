use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// The same delay before every retry.
    #[default]
    Fixed,
    /// `delay * n` before retry `n`.
    Linear,
}

/// Remaining attempts of one command execution, shared with whoever may want to cancel it.
#[derive(Debug, Clone)]
pub struct AttemptBudget(Arc<AtomicU32>);

impl AttemptBudget {
    fn new(attempts: u32) -> Self {
        Self(Arc::new(AtomicU32::new(attempts)))
    }

    pub fn remaining(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Drops the remaining attempts to zero. An attempt already on the wire runs to its
    /// timeout; no further attempt starts.
    pub fn cancel(&self) {
        self.0.store(0, Ordering::Release);
    }

    fn take_one(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Attempt limit and pacing for one command execution. Built per call and consumed by it.
#[derive(Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
    budget: AttemptBudget,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            delay,
            backoff,
            budget: AttemptBudget::new(max_attempts),
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, Backoff::Fixed)
    }

    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, Backoff::Linear)
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt.max(1)),
        }
    }

    /// Handle that can cancel the execution this policy is handed to.
    pub fn budget(&self) -> AttemptBudget {
        self.budget.clone()
    }

    pub(crate) fn begin_attempt(&self) -> bool {
        self.budget.take_one()
    }
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_and_linear_delays() {
        let fixed = RetryPolicy::fixed(3, Duration::from_millis(100));
        assert_eq!(fixed.delay_after(1), Duration::from_millis(100));
        assert_eq!(fixed.delay_after(2), Duration::from_millis(100));

        let linear = RetryPolicy::linear(3, Duration::from_millis(100));
        assert_eq!(linear.delay_after(1), Duration::from_millis(100));
        assert_eq!(linear.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn attempts_are_counted_down() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        assert!(policy.begin_attempt());
        assert!(policy.begin_attempt());
        assert!(!policy.begin_attempt());
        assert_eq!(policy.budget().remaining(), 0);
    }

    #[test]
    fn cancel_empties_budget() {
        let policy = RetryPolicy::default();
        let budget = policy.budget();
        assert_eq!(budget.remaining(), 3);
        budget.cancel();
        assert!(!policy.begin_attempt());
    }
}
