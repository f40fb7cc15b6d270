//! Harvester core: pure classification, accumulation and retry bookkeeping.
mod accumulator;
mod availability;
mod classify;
mod record;
mod response;
mod result;
mod retry;
mod target;

pub use accumulator::Accumulator;
pub use availability::{
    detect_unavailable, PageSnapshot, UnavailableReason, AVAILABILITY_RULES, MISSING_MARKERS,
    SUSPENDED_MARKERS, UNAVAILABLE_PATHS,
};
pub use classify::{
    classify, throttle_phrase, transport_verdict, ClassifiedOutcome, SkipReason,
    THROTTLE_PHRASES, TRANSPORT_RULES,
};
pub use record::Record;
pub use response::{CapturedResponse, ResponseMatcher};
pub use result::{CollectionResult, CollectionStatus};
pub use retry::{FailureClass, GlobalRetry, LocalRetry, RetryDecision, RetryState};
pub use target::{is_valid_handle, parse_subject_list, subject_handle, CollectionTarget, Mode};
