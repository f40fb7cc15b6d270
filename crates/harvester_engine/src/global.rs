//! Session tier: owns the automation session, rebuilds it when throttling
//! outlasts the local tier, and files unavailable subjects in the registry.

use std::sync::Arc;

use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::{
    is_valid_handle, subject_handle, CollectionResult, CollectionStatus, CollectionTarget,
    FailureClass, GlobalRetry, RetryDecision,
};
use thiserror::Error;
use tokio::time::sleep;

use crate::automation::{AuthStatus, AutomationError, Browser, BrowserSession};
use crate::local::LocalRetryController;
use crate::output::{OperationStatus, OutputStore};
use crate::persist::PersistError;
use crate::registry::ProblemRegistry;
use crate::{EngineEvent, Escalation, HarvestSettings, ProgressSink, RetryTier, SubjectOutcome};

/// Failures that stop a whole run rather than a single subject.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Automation(#[from] AutomationError),
}

pub struct GlobalRetryController {
    browser: Arc<dyn Browser>,
    /// Sessions from a rebuild are only kept when the login check passed.
    session: Option<Box<dyn BrowserSession>>,
    settings: HarvestSettings,
    registry: ProblemRegistry,
    output: OutputStore,
    sink: Arc<dyn ProgressSink>,
}

impl GlobalRetryController {
    pub fn new(
        browser: Arc<dyn Browser>,
        settings: HarvestSettings,
        registry: ProblemRegistry,
        output: OutputStore,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            browser,
            session: None,
            settings,
            registry,
            output,
            sink,
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProblemRegistry {
        &self.registry
    }

    pub fn output(&self) -> &OutputStore {
        &self.output
    }

    /// Opens the first session. It is kept even when the login check fails;
    /// `Ok(false)` reports that case.
    pub async fn start(&mut self) -> Result<bool, HarvestError> {
        if self.session.is_some() {
            return Ok(true);
        }
        Ok(self.open_session(true).await?)
    }

    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    /// Runs both operations for one listed subject and persists what they yield.
    /// Filesystem trouble is confined to the subject, which ends as abandoned.
    pub async fn process_subject(&mut self, subject_id: &str) -> SubjectOutcome {
        let handle = subject_handle(subject_id);
        if !is_valid_handle(handle) {
            engine_warn!("{subject_id:?}: not a usable subject id, skipping");
            return self.finish(subject_id, SubjectOutcome::SkippedInvalid);
        }

        let outcome = match self.collect_subject(subject_id, handle).await {
            Ok(outcome) => outcome,
            Err(err) => {
                engine_error!("{handle}: {err}, abandoning subject");
                SubjectOutcome::Abandoned
            }
        };
        self.finish(handle, outcome)
    }

    async fn collect_subject(
        &mut self,
        subject_id: &str,
        handle: &str,
    ) -> Result<SubjectOutcome, PersistError> {
        if self.registry.contains(subject_id) || self.registry.contains(handle) {
            engine_info!("{subject_id}: listed in {}, skipping", self.registry.path().display());
            self.discard_subject(handle);
            return Ok(SubjectOutcome::SkippedKnownProblem);
        }

        self.output.prepare_subject(handle)?;

        if self.session.is_none() && !self.reopen_session().await {
            engine_error!("{handle}: no usable session");
            let outcome = SubjectOutcome::Abandoned;
            self.output.write_status(handle, outcome, Vec::new())?;
            return Ok(outcome);
        }

        let targets = [
            CollectionTarget::paginated(handle, self.settings.desired_count),
            CollectionTarget::single_record(handle),
        ];
        let mut results: Vec<Option<CollectionResult>> = vec![None; targets.len()];
        let mut global = GlobalRetry::new(
            self.settings.global_max_attempts,
            self.settings.global_retry_delay,
        );

        loop {
            let Some(escalation) = self.run_pending(&targets, &mut results).await else {
                break;
            };

            match escalation {
                Escalation::Unavailable(reason) => {
                    engine_warn!("{handle}: unavailable ({reason})");
                    if let Err(err) = self.registry.add(subject_id) {
                        engine_error!("{handle}: {err}");
                    }
                    self.discard_subject(handle);
                    return Ok(SubjectOutcome::Unavailable);
                }
                Escalation::RateLimited { evidence } => match global.on_throttled() {
                    RetryDecision::Retry { attempt, delay } => {
                        engine_warn!("{handle}: still throttled after local retries ({evidence})");
                        self.sink.emit(EngineEvent::RetryScheduled {
                            subject: handle.to_string(),
                            tier: RetryTier::Global,
                            attempt,
                            delay,
                            reason: FailureClass::TransientThrottled,
                        });
                        self.teardown().await;
                        sleep(delay).await;
                        let ready = self.reopen_session().await;
                        self.sink.emit(EngineEvent::SessionRebuilt { attempt, ready });
                        if !ready {
                            engine_error!("{handle}: session rebuild failed, keeping what was collected");
                            break;
                        }
                    }
                    RetryDecision::Exhausted => {
                        engine_error!(
                            "{handle}: throttled after {} session rebuilds, giving up",
                            global.attempts_made() - 1
                        );
                        break;
                    }
                },
            }
        }

        self.persist_results(handle, &targets, results)
    }

    fn discard_subject(&self, handle: &str) {
        if let Err(err) = self.output.remove_subject(handle) {
            engine_error!("{handle}: could not remove output: {err}");
        }
    }

    /// Runs every operation that has not produced data yet. Stops at the first
    /// escalation and returns it.
    async fn run_pending(
        &mut self,
        targets: &[CollectionTarget],
        results: &mut [Option<CollectionResult>],
    ) -> Option<Escalation> {
        let session = self.session.as_mut()?;
        let local = LocalRetryController::new(&self.settings, self.sink.as_ref());

        for (target, slot) in targets.iter().zip(results.iter_mut()) {
            if slot.as_ref().is_some_and(|result| !result.is_empty()) {
                continue;
            }
            match local.collect(session.as_mut(), target).await {
                Ok(result) => *slot = Some(result),
                Err(escalation) => return Some(escalation),
            }
        }
        None
    }

    fn persist_results(
        &self,
        handle: &str,
        targets: &[CollectionTarget],
        results: Vec<Option<CollectionResult>>,
    ) -> Result<SubjectOutcome, PersistError> {
        let mut operations = Vec::with_capacity(targets.len());
        for (target, result) in targets.iter().zip(results) {
            let result = result.unwrap_or_else(CollectionResult::abandoned);
            self.output.write_records(handle, target.mode(), &result)?;
            operations.push(OperationStatus::new(target.mode(), &result));
        }

        let outcome = if operations
            .iter()
            .all(|op| op.status == CollectionStatus::Complete)
        {
            SubjectOutcome::Completed
        } else if operations.iter().all(|op| op.records == 0) {
            SubjectOutcome::Abandoned
        } else {
            SubjectOutcome::Partial
        };
        self.output.write_status(handle, outcome, operations)?;
        Ok(outcome)
    }

    async fn open_session(&mut self, keep_unready: bool) -> Result<bool, AutomationError> {
        let mut session = self.browser.new_session().await?;
        let status = match session.authenticate().await {
            Ok(status) => status,
            Err(err) => {
                engine_error!("login flow failed: {err}");
                AuthStatus::Failed
            }
        };
        match status {
            AuthStatus::LoggedIn => engine_info!("logged in"),
            AuthStatus::Uncertain => engine_warn!("login status uncertain"),
            AuthStatus::Failed => engine_error!("login failed"),
        }

        let ready = status.is_ready(self.settings.accept_uncertain_login);
        if ready || keep_unready {
            self.session = Some(session);
            return Ok(ready);
        }
        if let Err(err) = session.close().await {
            engine_warn!("closing rejected session failed: {err}");
        }
        Ok(false)
    }

    async fn reopen_session(&mut self) -> bool {
        match self.open_session(false).await {
            Ok(ready) => ready,
            Err(err) => {
                engine_error!("could not open a new session: {err}");
                false
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.close().await {
                engine_warn!("closing session failed: {err}");
            }
        }
    }

    fn finish(&self, handle: &str, outcome: SubjectOutcome) -> SubjectOutcome {
        self.sink.emit(EngineEvent::SubjectFinished {
            subject: handle.to_string(),
            outcome,
        });
        outcome
    }
}
