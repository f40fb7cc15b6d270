mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::*;
use harvester_engine::{
    run_subjects, AuthStatus, EngineEvent, GlobalRetryController, HarvestSettings,
    OutputStore, ProblemRegistry, ReplayScript, RetryTier, RunSummary, ScriptedBrowser,
    SubjectOutcome, VisitScript,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

struct Harness {
    _temp: TempDir,
    out: std::path::PathBuf,
    registry_path: std::path::PathBuf,
    browser: ScriptedBrowser,
    sink: TestSink,
    controller: GlobalRetryController,
}

fn harness(settings: HarvestSettings, script: ReplayScript) -> Harness {
    init_logging();
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    let registry_path = temp.path().join("problematic_usernames.txt");
    let browser = ScriptedBrowser::new(script);
    let sink = TestSink::new();
    let output = OutputStore::new(
        &out,
        settings.desired_count,
        Arc::new(|| "2024-01-01T00:00:00Z".to_string()),
    );
    let controller = GlobalRetryController::new(
        Arc::new(browser.clone()),
        settings,
        ProblemRegistry::open(&registry_path).unwrap(),
        output,
        Arc::new(sink.clone()),
    );
    Harness {
        _temp: temp,
        out,
        registry_path,
        browser,
        sink,
        controller,
    }
}

fn small_settings() -> HarvestSettings {
    HarvestSettings {
        desired_count: 2,
        ..HarvestSettings::default()
    }
}

fn script_for(settings: &HarvestSettings, handle: &str, visits: Vec<VisitScript>) -> ReplayScript {
    ReplayScript::default().with_page(subject_url(settings, handle), visits)
}

fn healthy_visit() -> VisitScript {
    loaded_visit(vec![timeline_page(1, &["1", "2"]), profile_response("42")])
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn healthy_subject_writes_all_artifacts() {
    let settings = small_settings();
    let script = script_for(&settings, SUBJECT, vec![healthy_visit()]);
    let mut h = harness(settings, script);

    let outcome = h.controller.process_subject("@alice").await;

    assert_eq!(outcome, SubjectOutcome::Completed);
    let dir = h.out.join(SUBJECT);
    let tweets = read_json(&dir.join("alice_last_2_tweets.json"));
    assert_eq!(tweets.as_array().map(Vec::len), Some(2));
    assert_eq!(tweets[0]["rest_id"], "1");
    let profile = read_json(&dir.join("alice_user_profile_info.json"));
    assert_eq!(profile[0]["rest_id"], "42");

    let status = read_json(&dir.join("alice_status.json"));
    assert_eq!(status["outcome"], "completed");
    assert_eq!(status["finished_at"], "2024-01-01T00:00:00Z");
    assert_eq!(status["operations"][0]["operation"], "timeline");
    assert_eq!(status["operations"][0]["status"], "complete");
    assert_eq!(status["operations"][1]["records"], 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_subject_is_registered_once_and_cleaned_up() {
    let settings = small_settings();
    let script = script_for(&settings, SUBJECT, vec![suspended_visit()]);
    let mut h = harness(settings, script);
    h.controller.start().await.unwrap();

    let first = h.controller.process_subject(SUBJECT).await;
    let navigations = h.browser.log().navigations.len();
    let second = h.controller.process_subject(SUBJECT).await;

    assert_eq!(first, SubjectOutcome::Unavailable);
    assert_eq!(second, SubjectOutcome::SkippedKnownProblem);
    assert_eq!(fs::read_to_string(&h.registry_path).unwrap(), "alice\n");
    assert!(!h.out.join(SUBJECT).exists());
    assert_eq!(h.browser.log().navigations.len(), navigations);
    assert!(h.controller.registry().contains(SUBJECT));
}

#[tokio::test(start_paused = true)]
async fn persistent_throttling_rebuilds_session_once() {
    let settings = HarvestSettings {
        local_max_attempts: 1,
        global_max_attempts: 1,
        ..small_settings()
    };
    let script = script_for(
        &settings,
        SUBJECT,
        vec![loaded_visit(vec![throttled_timeline(1)])],
    );
    let mut h = harness(settings, script);
    h.controller.start().await.unwrap();

    let outcome = h.controller.process_subject(SUBJECT).await;

    assert_eq!(outcome, SubjectOutcome::Abandoned);
    assert_eq!(h.sink.retry_delays(RetryTier::Global).len(), 1);
    assert!(h
        .sink
        .events()
        .contains(&EngineEvent::SessionRebuilt {
            attempt: 1,
            ready: true
        }));
    let log = h.browser.log();
    assert_eq!(log.sessions_opened, 2);
    assert_eq!(log.sessions_closed, 1);
    // Two local attempts before and after the rebuild; the profile never ran.
    assert_eq!(log.navigations.len(), 4);

    let dir = h.out.join(SUBJECT);
    assert!(!dir.join("alice_last_2_tweets.json").exists());
    assert_eq!(read_json(&dir.join("alice_status.json"))["outcome"], "abandoned");
}

#[tokio::test(start_paused = true)]
async fn finished_operations_are_not_repeated_after_rebuild() {
    let settings = HarvestSettings {
        local_max_attempts: 0,
        ..small_settings()
    };
    let visits = vec![
        loaded_visit(vec![timeline_page(1, &["1", "2"])]),
        loaded_visit(vec![throttled_profile()]),
        loaded_visit(vec![profile_response("42")]),
    ];
    let script = script_for(&settings, SUBJECT, visits);
    let mut h = harness(settings, script);
    h.controller.start().await.unwrap();

    let outcome = h.controller.process_subject(SUBJECT).await;

    assert_eq!(outcome, SubjectOutcome::Completed);
    let log = h.browser.log();
    assert_eq!(log.navigations.len(), 3);
    assert_eq!(log.sessions_opened, 2);
}

#[tokio::test(start_paused = true)]
async fn run_summarizes_outcomes_and_closes_session() {
    let settings = small_settings();
    let script = ReplayScript::default()
        .with_page(subject_url(&settings, "alice"), vec![healthy_visit()])
        .with_page(subject_url(&settings, "carol"), vec![suspended_visit()]);
    let mut h = harness(settings, script);

    let subjects = vec!["alice".to_string(), "carol".to_string()];
    let summary = run_subjects(&mut h.controller, &subjects).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            completed: 1,
            unavailable: 1,
            ..RunSummary::default()
        }
    );
    let log = h.browser.log();
    assert_eq!(log.sessions_opened, 1);
    assert_eq!(log.sessions_closed, 1);
    assert_eq!(log.logins, 1);
}

#[tokio::test(start_paused = true)]
async fn known_problem_subject_is_skipped_and_its_directory_removed() {
    let settings = small_settings();
    let script = script_for(&settings, "bob", vec![healthy_visit()]);
    let mut h = harness(settings, script);
    fs::write(&h.registry_path, "@bob\n").unwrap();
    let registry = ProblemRegistry::open(&h.registry_path).unwrap();
    let stale = h.out.join("bob");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("bob_status.json"), "{}").unwrap();

    let mut controller = GlobalRetryController::new(
        Arc::new(h.browser.clone()),
        small_settings(),
        registry,
        h.controller.output().clone(),
        Arc::new(h.sink.clone()),
    );
    let summary = run_subjects(&mut controller, &["@bob".to_string()])
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(!stale.exists());
    assert!(h.browser.log().navigations.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_initial_login_does_not_stop_the_run() {
    let settings = small_settings();
    let script = ReplayScript {
        login: AuthStatus::Failed,
        ..script_for(&settings, SUBJECT, vec![healthy_visit()])
    };
    let mut h = harness(settings, script);

    let summary = run_subjects(&mut h.controller, &[SUBJECT.to_string()])
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(h.browser.log().sessions_opened, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_login_after_rebuild_keeps_collected_records() {
    let settings = HarvestSettings {
        local_max_attempts: 0,
        ..small_settings()
    };
    let script = ReplayScript {
        login: AuthStatus::Uncertain,
        ..script_for(
            &settings,
            SUBJECT,
            vec![
                loaded_visit(vec![timeline_page(1, &["1"])]),
                loaded_visit(vec![throttled_profile()]),
            ],
        )
    };
    let strict = HarvestSettings {
        accept_uncertain_login: false,
        ..settings
    };
    let mut h = harness(strict, script);
    assert!(!h.controller.start().await.unwrap());

    let outcome = h.controller.process_subject(SUBJECT).await;

    // The timeline result survives; the rebuilt session is rejected.
    assert_eq!(outcome, SubjectOutcome::Partial);
    assert!(h.sink.events().contains(&EngineEvent::SessionRebuilt {
        attempt: 1,
        ready: false
    }));
    let log = h.browser.log();
    assert_eq!(log.sessions_opened, 2);
    assert_eq!(log.sessions_closed, 2);
    assert!(h.out.join(SUBJECT).join("alice_last_2_tweets.json").exists());
}

#[tokio::test(start_paused = true)]
async fn uncertain_login_follows_settings() {
    let strict = HarvestSettings {
        accept_uncertain_login: false,
        ..small_settings()
    };
    let script = ReplayScript {
        login: AuthStatus::Uncertain,
        ..script_for(&strict, SUBJECT, vec![healthy_visit()])
    };

    let mut lenient = harness(small_settings(), script.clone());
    assert!(lenient.controller.start().await.unwrap());

    let mut h = harness(strict, script);
    assert!(!h.controller.start().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn ids_without_a_usable_handle_never_touch_the_output_root() {
    let settings = small_settings();
    let script = script_for(&settings, "", vec![suspended_visit()]);
    let mut h = harness(settings, script);
    let bob = h.out.join("bob");
    fs::create_dir_all(&bob).unwrap();
    fs::write(bob.join("bob_status.json"), "{}").unwrap();

    let subjects: Vec<String> = ["@", "@@", ".", "..", "../bob", "/x"]
        .iter()
        .map(|id| id.to_string())
        .collect();
    let summary = run_subjects(&mut h.controller, &subjects).await.unwrap();

    assert_eq!(summary.invalid, subjects.len());
    assert_eq!(summary.total(), subjects.len());
    assert!(bob.join("bob_status.json").exists());
    assert!(h.browser.log().navigations.is_empty());
    assert!(!h.registry_path.exists());
}

#[tokio::test(start_paused = true)]
async fn output_failure_for_one_subject_does_not_stop_the_run() {
    let settings = small_settings();
    let script = ReplayScript::default()
        .with_page(subject_url(&settings, "bob"), vec![healthy_visit()])
        .with_page(subject_url(&settings, "alice"), vec![healthy_visit()]);
    let mut h = harness(settings, script);
    fs::create_dir_all(&h.out).unwrap();
    fs::write(h.out.join("bob"), "not a directory").unwrap();

    let subjects = vec!["bob".to_string(), "alice".to_string()];
    let summary = run_subjects(&mut h.controller, &subjects).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            completed: 1,
            abandoned: 1,
            ..RunSummary::default()
        }
    );
    assert!(h.out.join("alice").join("alice_status.json").exists());
    assert!(h.sink.events().contains(&EngineEvent::SubjectFinished {
        subject: "bob".into(),
        outcome: SubjectOutcome::Abandoned,
    }));
}

#[tokio::test(start_paused = true)]
async fn silent_timeline_registers_the_subject() {
    let settings = small_settings();
    let script = script_for(&settings, SUBJECT, vec![loaded_visit(vec![])]);
    let mut h = harness(settings, script);
    h.controller.start().await.unwrap();

    let outcome = h.controller.process_subject(SUBJECT).await;

    assert_eq!(outcome, SubjectOutcome::Unavailable);
    assert_eq!(fs::read_to_string(&h.registry_path).unwrap(), "alice\n");
    assert!(!h.out.join(SUBJECT).exists());
}
