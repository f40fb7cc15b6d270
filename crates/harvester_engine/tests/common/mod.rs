#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use harvester_engine::{
    EngineEvent, HarvestSettings, ProgressSink, RetryTier, ScriptedResponse, VisitScript,
};
use serde_json::{json, Value};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

#[derive(Clone, Default)]
pub struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn attempts_started(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, EngineEvent::AttemptStarted { .. }))
            .count()
    }

    pub fn retry_delays(&self, wanted: RetryTier) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::RetryScheduled { tier, delay, .. } if tier == wanted => Some(delay),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub const SUBJECT: &str = "alice";

pub fn subject_url(settings: &HarvestSettings, handle: &str) -> String {
    settings.profile_url(handle)
}

fn tweet(id: &str) -> Value {
    json!({
        "__typename": "Tweet",
        "rest_id": id,
        "legacy": { "full_text": format!("tweet {id}") }
    })
}

pub fn timeline_body(ids: &[&str]) -> Value {
    let entries: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "entryId": format!("tweet-{id}"),
                "content": {
                    "entryType": "TimelineTimelineItem",
                    "itemContent": {
                        "itemType": "TimelineTweet",
                        "tweet_results": { "result": tweet(id) }
                    }
                }
            })
        })
        .collect();
    json!({
        "data": { "user": { "result": {
            "timeline_v2": { "timeline": { "instructions": [
                { "type": "TimelineAddEntries", "entries": entries }
            ] } }
        } } }
    })
}

/// Timeline page `cursor`; distinct cursors give distinct URLs.
pub fn timeline_page(cursor: u32, ids: &[&str]) -> ScriptedResponse {
    ScriptedResponse::json(
        format!("https://x.com/i/api/graphql/q1/UserTweets?cursor={cursor}"),
        timeline_body(ids),
    )
}

pub fn throttled_timeline(cursor: u32) -> ScriptedResponse {
    ScriptedResponse::json(
        format!("https://x.com/i/api/graphql/q1/UserTweets?throttled={cursor}"),
        json!({ "errors": [{ "message": "Rate limit exceeded" }] }),
    )
    .with_status(429)
}

pub fn profile_response(id: &str) -> ScriptedResponse {
    ScriptedResponse::json(
        format!("https://x.com/i/api/graphql/q2/UserByScreenName?id={id}"),
        json!({
            "data": { "user": { "result": {
                "__typename": "User",
                "rest_id": id,
                "legacy": { "screen_name": SUBJECT, "followers_count": 3 }
            } } }
        }),
    )
}

pub fn throttled_profile() -> ScriptedResponse {
    ScriptedResponse::json(
        "https://x.com/i/api/graphql/q2/UserByScreenName?throttled=1",
        json!({}),
    )
    .with_status(429)
}

/// A visit that renders normally and emits `on_load` right away.
pub fn loaded_visit(on_load: Vec<ScriptedResponse>) -> VisitScript {
    VisitScript {
        markers: vec![HarvestSettings::default().content_marker],
        on_load,
        ..VisitScript::default()
    }
}

pub fn suspended_visit() -> VisitScript {
    VisitScript {
        text: Some("Account suspended\nX suspends accounts which violate the X Rules".into()),
        ..VisitScript::default()
    }
}

pub fn broken_visit() -> VisitScript {
    VisitScript {
        navigation_error: Some("net::ERR_CONNECTION_RESET".into()),
        ..VisitScript::default()
    }
}
