mod common;

use std::time::Duration;

use common::*;
use harvester_core::{CollectionResult, CollectionStatus, CollectionTarget, UnavailableReason};
use harvester_engine::{
    Browser, Escalation, HarvestSettings, LocalRetryController, ReplayScript, RetryTier,
    ScriptedBrowser, VisitScript,
};
use pretty_assertions::assert_eq;

async fn collect(
    settings: &HarvestSettings,
    visits: Vec<VisitScript>,
    target: CollectionTarget,
) -> (Result<CollectionResult, Escalation>, ScriptedBrowser, TestSink) {
    init_logging();
    let url = subject_url(settings, target.subject_id());
    let browser = ScriptedBrowser::new(ReplayScript::default().with_page(url, visits));
    let sink = TestSink::new();
    let mut session = browser.new_session().await.unwrap();
    let result = LocalRetryController::new(settings, &sink)
        .collect(session.as_mut(), &target)
        .await;
    (result, browser, sink)
}

fn throttled_visit() -> VisitScript {
    loaded_visit(vec![throttled_timeline(1)])
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

#[tokio::test(start_paused = true)]
async fn throttling_backs_off_linearly_then_escalates() {
    let settings = HarvestSettings::default();

    let (result, browser, sink) = collect(
        &settings,
        vec![throttled_visit()],
        CollectionTarget::paginated(SUBJECT, 10),
    )
    .await;

    assert!(
        matches!(result, Err(Escalation::RateLimited { .. })),
        "{result:?}"
    );
    assert_eq!(sink.retry_delays(RetryTier::Local), secs(&[180, 240, 300]));
    assert_eq!(sink.attempts_started(), 4);
    let log = browser.log();
    assert_eq!(log.pages_opened, 4);
    assert_eq!(log.pages_closed, 4);
}

#[tokio::test(start_paused = true)]
async fn throttled_attempt_recovers_on_retry() {
    let settings = HarvestSettings::default();
    let visits = vec![
        throttled_visit(),
        loaded_visit(vec![timeline_page(1, &["1", "2"])]),
    ];

    let (result, _, sink) =
        collect(&settings, visits, CollectionTarget::paginated(SUBJECT, 2)).await;

    let result = result.unwrap();
    assert_eq!(result.status, CollectionStatus::Complete);
    assert_eq!(result.records.len(), 2);
    assert_eq!(sink.retry_delays(RetryTier::Local), secs(&[180]));
}

#[tokio::test(start_paused = true)]
async fn partial_outcome_is_returned_without_retrying() {
    let settings = HarvestSettings::default();
    let visits = vec![loaded_visit(vec![timeline_page(1, &["1"])])];

    let (result, _, sink) =
        collect(&settings, visits, CollectionTarget::paginated(SUBJECT, 50)).await;

    let result = result.unwrap();
    assert_eq!(result.status, CollectionStatus::PartialTimeout);
    assert_eq!(result.records.len(), 1);
    assert_eq!(sink.attempts_started(), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_subject_is_never_retried() {
    let settings = HarvestSettings::default();

    let (result, _, sink) = collect(
        &settings,
        vec![suspended_visit()],
        CollectionTarget::single_record(SUBJECT),
    )
    .await;

    assert!(
        matches!(
            result,
            Err(Escalation::Unavailable(UnavailableReason::Suspended { .. }))
        ),
        "{result:?}"
    );
    assert_eq!(sink.attempts_started(), 1);
    assert!(sink.retry_delays(RetryTier::Local).is_empty());
}

#[tokio::test(start_paused = true)]
async fn generic_failures_use_fixed_delay_then_abandon() {
    let settings = HarvestSettings::default();

    let (result, _, sink) = collect(
        &settings,
        vec![broken_visit()],
        CollectionTarget::paginated(SUBJECT, 10),
    )
    .await;

    assert_eq!(result, Ok(CollectionResult::abandoned()));
    assert_eq!(sink.retry_delays(RetryTier::Local), secs(&[30, 30, 30]));
}

#[tokio::test(start_paused = true)]
async fn throttled_and_generic_failures_share_one_budget() {
    let settings = HarvestSettings::default();
    let visits = vec![
        throttled_visit(),
        broken_visit(),
        throttled_visit(),
        broken_visit(),
    ];

    let (result, _, sink) =
        collect(&settings, visits, CollectionTarget::paginated(SUBJECT, 10)).await;

    // Throttled delays follow the attempt number, generic ones stay fixed.
    assert_eq!(sink.retry_delays(RetryTier::Local), secs(&[180, 30, 300]));
    assert_eq!(result, Ok(CollectionResult::abandoned()));
}

#[tokio::test(start_paused = true)]
async fn zero_local_attempts_escalates_immediately() {
    let settings = HarvestSettings {
        local_max_attempts: 0,
        ..HarvestSettings::default()
    };

    let (result, _, sink) = collect(
        &settings,
        vec![loaded_visit(vec![throttled_profile()])],
        CollectionTarget::single_record(SUBJECT),
    )
    .await;

    assert!(matches!(result, Err(Escalation::RateLimited { .. })));
    assert_eq!(sink.attempts_started(), 1);
}
