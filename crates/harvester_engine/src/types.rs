use std::fmt;
use std::time::Duration;

use harvester_core::{FailureClass, Mode, Record, UnavailableReason};

/// Non-terminal states of one attempt, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Init,
    NavigateWait,
    AvailabilityCheck,
    ContentWait,
    PaginateLoop,
    SingleWaitLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// Target count reached, or the single record was captured.
    Complete,
    /// Budget or no-progress limit hit; whatever was collected is kept.
    Partial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub status: AttemptStatus,
    pub records: Vec<Record>,
    /// Responses of the expected kind examined during the attempt.
    pub responses_examined: usize,
}

/// Why an attempt ended without an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    RateLimited { evidence: String },
    Unavailable(UnavailableReason),
    Timeout { phase: AttemptPhase },
    Internal(String),
}

impl AttemptFailure {
    pub fn class(&self) -> FailureClass {
        match self {
            AttemptFailure::RateLimited { .. } => FailureClass::TransientThrottled,
            AttemptFailure::Unavailable(_) => FailureClass::PermanentUnavailable,
            AttemptFailure::Timeout { .. } | AttemptFailure::Internal(_) => {
                FailureClass::TransientGeneric
            }
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::RateLimited { evidence } => write!(f, "rate limited: {evidence}"),
            AttemptFailure::Unavailable(reason) => write!(f, "unavailable: {reason}"),
            AttemptFailure::Timeout { phase } => write!(f, "timeout during {phase:?}"),
            AttemptFailure::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

/// Signals the local tier hands up to the session tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    RateLimited { evidence: String },
    Unavailable(UnavailableReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTier {
    Local,
    Global,
}

/// How processing of one subject ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectOutcome {
    Completed,
    Partial,
    Abandoned,
    Unavailable,
    SkippedKnownProblem,
    /// The listed id does not yield a usable handle.
    SkippedInvalid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    AttemptStarted {
        subject: String,
        mode: Mode,
        attempt: u32,
    },
    PhaseEntered {
        subject: String,
        phase: AttemptPhase,
    },
    RetryScheduled {
        subject: String,
        tier: RetryTier,
        attempt: u32,
        delay: Duration,
        reason: FailureClass,
    },
    SessionRebuilt {
        attempt: u32,
        ready: bool,
    },
    SubjectFinished {
        subject: String,
        outcome: SubjectOutcome,
    },
}
