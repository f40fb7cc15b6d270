//! Response classification.
//!
//! Every captured response maps to exactly one [`ClassifiedOutcome`]. The
//! transport rules run first, in order; the first rule that returns a verdict
//! wins. Surviving responses are parsed and handed to the envelope extractor
//! for the requested [`Mode`]. Nothing in here panics on hostile input.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::{CapturedResponse, Mode, Record};

/// Phrases the platform uses in throttling pages, matched case-insensitively.
pub const THROTTLE_PHRASES: &[&str] = &["rate limit", "too many requests", "temporarily locked"];

const ADD_ENTRIES_INSTRUCTION: &str = "TimelineAddEntries";
const TIMELINE_ITEM_ENTRY: &str = "TimelineTimelineItem";
const TWEET_ITEM: &str = "TimelineTweet";
const VISIBILITY_WRAPPER: &str = "TweetWithVisibilityResults";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    HttpError(u16),
    WrongContentType,
    EmptyBody,
    NoEnvelope,
    /// Envelope present but it carried no candidate records.
    NoRecords,
    /// Candidates were present but none had an id and a legacy block.
    UnrecognizedRecord,
    /// Single-record envelope without id, with error markers, or without detail block.
    IncompleteRecord,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::HttpError(status) => write!(f, "http status {status}"),
            SkipReason::WrongContentType => write!(f, "non-json content type"),
            SkipReason::EmptyBody => write!(f, "empty body"),
            SkipReason::NoEnvelope => write!(f, "missing data envelope"),
            SkipReason::NoRecords => write!(f, "no candidate records"),
            SkipReason::UnrecognizedRecord => write!(f, "unrecognized record shape"),
            SkipReason::IncompleteRecord => write!(f, "incomplete record"),
        }
    }
}

/// Tagged verdict for one response.
///
/// `Accepted` is never empty. Paginated responses may carry many records,
/// single-record responses carry exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedOutcome {
    Accepted(Vec<Record>),
    Skipped(SkipReason),
    RateLimited(String),
    Malformed(String),
}

type TransportRule = fn(&CapturedResponse) -> Option<ClassifiedOutcome>;

/// Status, content-type and body-presence rules, in priority order.
pub const TRANSPORT_RULES: &[(&str, TransportRule)] = &[
    ("too_many_requests", too_many_requests),
    ("http_error", http_error),
    ("content_type", non_json_content),
    ("empty_body", empty_body),
];

pub fn classify(response: &CapturedResponse, mode: Mode) -> ClassifiedOutcome {
    if let Some(verdict) = transport_verdict(response) {
        return verdict;
    }

    let text = response.body_text().unwrap_or_default();
    let parsed: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            return match throttle_phrase(&text) {
                Some(phrase) => ClassifiedOutcome::RateLimited(format!(
                    "unparseable body mentions '{phrase}' ({err})"
                )),
                None => ClassifiedOutcome::Malformed(err.to_string()),
            };
        }
    };

    let Some(data) = parsed.get("data") else {
        return ClassifiedOutcome::Skipped(SkipReason::NoEnvelope);
    };

    match mode {
        Mode::Paginated => extract_timeline(data),
        Mode::SingleRecord => extract_profile(&parsed, data),
    }
}

/// Runs [`TRANSPORT_RULES`] and returns the first verdict, if any.
pub fn transport_verdict(response: &CapturedResponse) -> Option<ClassifiedOutcome> {
    TRANSPORT_RULES.iter().find_map(|(_, rule)| rule(response))
}

/// First throttling phrase contained in `text`, if any.
pub fn throttle_phrase(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    THROTTLE_PHRASES
        .iter()
        .copied()
        .find(|phrase| lower.contains(phrase))
}

fn too_many_requests(response: &CapturedResponse) -> Option<ClassifiedOutcome> {
    (response.status == 429).then(|| {
        ClassifiedOutcome::RateLimited(format!("status 429 on {}", response.url))
    })
}

fn http_error(response: &CapturedResponse) -> Option<ClassifiedOutcome> {
    if response.is_success() {
        return None;
    }
    Some(match body_throttle_phrase(response) {
        Some(phrase) => ClassifiedOutcome::RateLimited(format!(
            "status {} with '{phrase}' on {}",
            response.status, response.url
        )),
        None => ClassifiedOutcome::Skipped(SkipReason::HttpError(response.status)),
    })
}

fn non_json_content(response: &CapturedResponse) -> Option<ClassifiedOutcome> {
    if response.is_json() {
        return None;
    }
    Some(match body_throttle_phrase(response) {
        Some(phrase) => ClassifiedOutcome::RateLimited(format!(
            "'{phrase}' in {} body on {}",
            response.content_type, response.url
        )),
        None => ClassifiedOutcome::Skipped(SkipReason::WrongContentType),
    })
}

fn empty_body(response: &CapturedResponse) -> Option<ClassifiedOutcome> {
    let empty = response
        .body_text()
        .map_or(true, |text| text.trim().is_empty());
    empty.then_some(ClassifiedOutcome::Skipped(SkipReason::EmptyBody))
}

fn body_throttle_phrase(response: &CapturedResponse) -> Option<&'static str> {
    response.body_text().and_then(|text| throttle_phrase(&text))
}

fn user_result(data: &Value) -> Option<&Map<String, Value>> {
    data.get("user")?.get("result")?.as_object()
}

fn timeline_instructions(user: &Map<String, Value>) -> Option<&Vec<Value>> {
    ["timeline", "timeline_v2"].iter().find_map(|key| {
        user.get(*key)?
            .get("timeline")?
            .get("instructions")?
            .as_array()
    })
}

fn extract_timeline(data: &Value) -> ClassifiedOutcome {
    let Some(user) = user_result(data) else {
        return ClassifiedOutcome::Skipped(SkipReason::NoEnvelope);
    };
    let Some(instructions) = timeline_instructions(user) else {
        return ClassifiedOutcome::Skipped(SkipReason::NoRecords);
    };

    let mut candidates = 0usize;
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for entry in add_entries(instructions) {
        let Some(candidate) = timeline_candidate(entry) else {
            continue;
        };
        candidates += 1;
        if let Some(record) = recognized_record(candidate) {
            if seen.insert(record.key().to_string()) {
                records.push(record);
            }
        }
    }

    match (candidates, records.is_empty()) {
        (0, _) => ClassifiedOutcome::Skipped(SkipReason::NoRecords),
        (_, true) => ClassifiedOutcome::Skipped(SkipReason::UnrecognizedRecord),
        (_, false) => ClassifiedOutcome::Accepted(records),
    }
}

/// Entries of every "add entries" instruction, in document order.
fn add_entries(instructions: &[Value]) -> impl Iterator<Item = &Value> {
    instructions
        .iter()
        .filter(|instruction| {
            instruction.get("type").and_then(Value::as_str) == Some(ADD_ENTRIES_INSTRUCTION)
        })
        .filter_map(|instruction| instruction.get("entries")?.as_array())
        .flatten()
}

fn timeline_candidate(entry: &Value) -> Option<&Value> {
    let content = entry.get("content")?;
    if content.get("entryType").and_then(Value::as_str) != Some(TIMELINE_ITEM_ENTRY) {
        return None;
    }
    let item = content.get("itemContent")?;
    if item.get("itemType").and_then(Value::as_str) != Some(TWEET_ITEM) {
        return None;
    }
    let result = item.get("tweet_results")?.get("result")?;
    match result.get("__typename").and_then(Value::as_str) {
        Some(VISIBILITY_WRAPPER) => result.get("tweet"),
        _ => Some(result),
    }
}

fn recognized_record(candidate: &Value) -> Option<Record> {
    let key = record_key(candidate)?;
    candidate.get("legacy")?.as_object()?;
    Some(Record::new(key, candidate.clone()))
}

fn record_key(value: &Value) -> Option<String> {
    match value.get("rest_id")? {
        Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn extract_profile(root: &Value, data: &Value) -> ClassifiedOutcome {
    let Some(user) = user_result(data) else {
        return ClassifiedOutcome::Skipped(SkipReason::NoEnvelope);
    };
    let has_errors = root.get("errors").is_some();
    let has_detail = user
        .get("legacy")
        .and_then(Value::as_object)
        .is_some_and(|legacy| !legacy.is_empty());
    let user_value = Value::Object(user.clone());
    match record_key(&user_value) {
        Some(key) if has_detail && !has_errors => {
            ClassifiedOutcome::Accepted(vec![Record::new(key, user_value)])
        }
        _ => ClassifiedOutcome::Skipped(SkipReason::IncompleteRecord),
    }
}
