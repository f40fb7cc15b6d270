use std::fmt;
use std::time::Duration;

/// Error taxonomy shared by both retry tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    TransientThrottled,
    TransientGeneric,
    PermanentUnavailable,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::TransientThrottled => write!(f, "throttled"),
            FailureClass::TransientGeneric => write!(f, "transient error"),
            FailureClass::PermanentUnavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    Exhausted,
}

/// Attempt counter plus linear backoff for one retry tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts_made: u32,
    max_attempts: u32,
    base_delay: Duration,
    increment: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, base_delay: Duration, increment: Duration) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            base_delay,
            increment,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, Duration::ZERO)
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `base + (attempt - 1) * increment`, for 1-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay + self.increment * attempt.saturating_sub(1)
    }

    /// Counts one failure and decides whether another try is allowed.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.record_failure_with(None)
    }

    fn record_failure_with(&mut self, fixed_delay: Option<Duration>) -> RetryDecision {
        self.attempts_made += 1;
        if self.attempts_made > self.max_attempts {
            return RetryDecision::Exhausted;
        }
        RetryDecision::Retry {
            attempt: self.attempts_made,
            delay: fixed_delay.unwrap_or_else(|| self.delay_for(self.attempts_made)),
        }
    }
}

/// In-session tier. Throttling and generic faults share one attempt budget
/// but wait differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRetry {
    state: RetryState,
    generic_delay: Duration,
}

impl LocalRetry {
    pub fn new(state: RetryState, generic_delay: Duration) -> Self {
        Self {
            state,
            generic_delay,
        }
    }

    /// Escalating delay; `Exhausted` means escalate to the session tier.
    pub fn on_throttled(&mut self) -> RetryDecision {
        self.state.record_failure()
    }

    /// Fixed delay; `Exhausted` means give the operation up.
    pub fn on_generic(&mut self) -> RetryDecision {
        self.state.record_failure_with(Some(self.generic_delay))
    }

    pub fn attempts_made(&self) -> u32 {
        self.state.attempts_made()
    }
}

/// Session-rebuild tier, only ever fed throttling escalations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRetry {
    state: RetryState,
}

impl GlobalRetry {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            state: RetryState::fixed(max_attempts, delay),
        }
    }

    pub fn on_throttled(&mut self) -> RetryDecision {
        self.state.record_failure()
    }

    pub fn attempts_made(&self) -> u32 {
        self.state.attempts_made()
    }
}
