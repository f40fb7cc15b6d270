//! One bounded-time collection attempt.
//!
//! `Init -> NavigateWait -> AvailabilityCheck -> ContentWait -> {PaginateLoop | SingleWaitLoop}`.
//! Every exit closes the page the attempt opened; the response subscription
//! lives on that page and is dropped with it.

use std::collections::HashSet;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn, excerpt, EXCERPT_CHARS};
use harvester_core::{
    classify, detect_unavailable, Accumulator, CapturedResponse, ClassifiedOutcome,
    CollectionTarget, Mode, ResponseMatcher, UnavailableReason,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Instant};

use crate::automation::{bounded, AutomationError, BrowserPage, BrowserSession};
use crate::{
    AttemptFailure, AttemptOutcome, AttemptPhase, AttemptStatus, EngineEvent, HarvestSettings,
    ProgressSink,
};

const SNAPSHOT_LIMIT: Duration = Duration::from_secs(5);
const ADVANCE_LIMIT: Duration = Duration::from_secs(10);

struct AttemptState {
    accumulator: Accumulator,
    processed: HashSet<String>,
    started: Instant,
    no_progress_streak: u32,
    responses_examined: usize,
}

impl AttemptState {
    fn new(target: &CollectionTarget) -> Self {
        Self {
            accumulator: Accumulator::for_target(target),
            processed: HashSet::new(),
            started: Instant::now(),
            no_progress_streak: 0,
            responses_examined: 0,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn remaining(&self, budget: Duration) -> Duration {
        budget.saturating_sub(self.elapsed())
    }

    /// Drains the subscription, keeping matching responses not seen before.
    /// Kept responses count as processed from here on.
    fn take_batch(
        &mut self,
        responses: &mut UnboundedReceiver<CapturedResponse>,
        matcher: &ResponseMatcher,
    ) -> Vec<CapturedResponse> {
        let mut batch = Vec::new();
        while let Ok(response) = responses.try_recv() {
            if matcher.matches(&response) && self.processed.insert(response.url.clone()) {
                batch.push(response);
            }
        }
        batch
    }

    fn finish(self, status: AttemptStatus) -> AttemptOutcome {
        AttemptOutcome {
            status,
            records: self.accumulator.into_records(),
            responses_examined: self.responses_examined,
        }
    }
}

pub struct AttemptDriver<'a> {
    settings: &'a HarvestSettings,
    sink: &'a dyn ProgressSink,
}

impl<'a> AttemptDriver<'a> {
    pub fn new(settings: &'a HarvestSettings, sink: &'a dyn ProgressSink) -> Self {
        Self { settings, sink }
    }

    /// Runs a single attempt on a fresh page borrowed from `session`.
    pub async fn run(
        &self,
        session: &mut dyn BrowserSession,
        target: &CollectionTarget,
        budget: Duration,
    ) -> Result<AttemptOutcome, AttemptFailure> {
        self.enter(target, AttemptPhase::Init);
        let mut page = session
            .open_page()
            .await
            .map_err(|err| AttemptFailure::Internal(format!("could not open page: {err}")))?;

        let result = self.drive(page.as_mut(), target, budget).await;

        if let Err(err) = page.close().await {
            engine_debug!("{}: closing page failed: {err}", target.subject_id());
        }
        result
    }

    async fn drive(
        &self,
        page: &mut dyn BrowserPage,
        target: &CollectionTarget,
        budget: Duration,
    ) -> Result<AttemptOutcome, AttemptFailure> {
        let subject = target.subject_id();
        let mut state = AttemptState::new(target);
        let mut responses = page.responses();

        self.enter(target, AttemptPhase::NavigateWait);
        let url = self.settings.profile_url(subject);
        let nav_limit = budget.min(self.settings.navigation_cap);
        bounded(nav_limit, page.navigate(&url, nav_limit))
            .await
            .map_err(|err| match err {
                AutomationError::Timeout(_) => AttemptFailure::Timeout {
                    phase: AttemptPhase::NavigateWait,
                },
                other => AttemptFailure::Internal(other.to_string()),
            })?;

        self.enter(target, AttemptPhase::AvailabilityCheck);
        self.check_availability(page, subject).await?;
        if state.remaining(budget).is_zero() {
            engine_warn!("{subject}: budget spent right after page load");
            return Ok(state.finish(AttemptStatus::Partial));
        }

        self.enter(target, AttemptPhase::ContentWait);
        self.wait_for_content(page, &state, budget, subject).await?;
        sleep(self.settings.settle_pause).await;

        match target.mode() {
            Mode::Paginated => {
                self.enter(target, AttemptPhase::PaginateLoop);
                self.paginate(page, &mut responses, state, budget, subject)
                    .await
            }
            Mode::SingleRecord => {
                self.enter(target, AttemptPhase::SingleWaitLoop);
                self.await_single(&mut responses, state, budget, subject)
                    .await
            }
        }
    }

    async fn check_availability(
        &self,
        page: &mut dyn BrowserPage,
        subject: &str,
    ) -> Result<(), AttemptFailure> {
        sleep(self.settings.availability_settle).await;
        let snapshot = match bounded(SNAPSHOT_LIMIT, page.snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                engine_debug!("{subject}: no page snapshot ({err}), availability unknown");
                return Ok(());
            }
        };
        match detect_unavailable(&snapshot) {
            Some(reason) => {
                engine_info!("{subject}: page reports {reason}");
                Err(AttemptFailure::Unavailable(reason))
            }
            None => Ok(()),
        }
    }

    async fn wait_for_content(
        &self,
        page: &mut dyn BrowserPage,
        state: &AttemptState,
        budget: Duration,
        subject: &str,
    ) -> Result<(), AttemptFailure> {
        let wait = self.settings.content_wait_cap.min(
            state
                .remaining(budget)
                .saturating_sub(self.settings.content_wait_buffer),
        );
        if wait <= self.settings.min_content_wait {
            engine_warn!("{subject}: only {wait:?} left to wait for content");
            return Err(self.content_missing(page, subject).await);
        }

        let marker = self.settings.content_marker.as_str();
        match bounded(wait, page.wait_for_marker(marker, wait)).await {
            Ok(()) => Ok(()),
            Err(AutomationError::MarkerNotFound { .. } | AutomationError::Timeout(_)) => {
                engine_info!("{subject}: content marker missing after {wait:?}, re-checking page");
                Err(self.content_missing(page, subject).await)
            }
            Err(other) => Err(AttemptFailure::Internal(other.to_string())),
        }
    }

    /// Missing primary content without an explicit error text still means unavailable.
    async fn content_missing(&self, page: &mut dyn BrowserPage, subject: &str) -> AttemptFailure {
        match self.check_availability(page, subject).await {
            Err(failure) => failure,
            Ok(()) => AttemptFailure::Unavailable(UnavailableReason::ContentNeverRendered),
        }
    }

    async fn paginate(
        &self,
        page: &mut dyn BrowserPage,
        responses: &mut UnboundedReceiver<CapturedResponse>,
        mut state: AttemptState,
        budget: Duration,
        subject: &str,
    ) -> Result<AttemptOutcome, AttemptFailure> {
        let matcher = self.settings.matcher(Mode::Paginated);
        let target_count = state.accumulator.capacity();
        engine_info!("{subject}: collecting up to {target_count} records");

        self.advance(page).await?;
        sleep(self.settings.initial_advance_pause).await;

        loop {
            if state.accumulator.is_full() {
                break;
            }
            if state.elapsed() + self.settings.loop_reserve >= budget {
                engine_warn!("{subject}: time budget exhausted while paginating");
                break;
            }

            let mut accepted = 0;
            for response in state.take_batch(responses, matcher) {
                state.responses_examined += 1;
                match classify(&response, Mode::Paginated) {
                    ClassifiedOutcome::Accepted(records) => {
                        accepted += state.accumulator.offer_all(records);
                    }
                    ClassifiedOutcome::RateLimited(evidence) => {
                        return Err(AttemptFailure::RateLimited { evidence });
                    }
                    rejected => log_rejected(subject, &response, &rejected),
                }
                if state.accumulator.is_full() {
                    break;
                }
            }

            if accepted > 0 {
                state.no_progress_streak = 0;
                engine_debug!(
                    "{subject}: {}/{target_count} records",
                    state.accumulator.len()
                );
                continue;
            }

            state.no_progress_streak += 1;
            if state.no_progress_streak > self.settings.no_progress_threshold {
                engine_info!(
                    "{subject}: no new records after {} advances",
                    self.settings.no_progress_threshold
                );
                break;
            }
            self.advance(page).await?;
            sleep(self.settings.advance_pause).await;
        }

        let silent = state.responses_examined == 0
            && state.accumulator.is_empty()
            && state.no_progress_streak > self.settings.no_progress_threshold;
        if silent {
            engine_info!("{subject}: expected endpoint never answered while paginating");
            return Err(AttemptFailure::Unavailable(
                UnavailableReason::EndpointSilent,
            ));
        }

        let collected = state.accumulator.len();
        let status = if state.accumulator.is_full() {
            AttemptStatus::Complete
        } else {
            engine_warn!("{subject}: collected {collected}/{target_count} records");
            AttemptStatus::Partial
        };
        Ok(state.finish(status))
    }

    async fn await_single(
        &self,
        responses: &mut UnboundedReceiver<CapturedResponse>,
        mut state: AttemptState,
        budget: Duration,
        subject: &str,
    ) -> Result<AttemptOutcome, AttemptFailure> {
        let matcher = self.settings.matcher(Mode::SingleRecord);
        let remaining = state.remaining(budget);
        let window = self
            .settings
            .single_record_min_wait
            .max(remaining.saturating_sub(self.settings.loop_reserve))
            .min(remaining);
        let deadline = Instant::now() + window;

        loop {
            for response in state.take_batch(responses, matcher) {
                state.responses_examined += 1;
                match classify(&response, Mode::SingleRecord) {
                    ClassifiedOutcome::Accepted(records) => {
                        if state.accumulator.offer_all(records) > 0 {
                            return Ok(state.finish(AttemptStatus::Complete));
                        }
                    }
                    ClassifiedOutcome::RateLimited(evidence) => {
                        return Err(AttemptFailure::RateLimited { evidence });
                    }
                    rejected => log_rejected(subject, &response, &rejected),
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(self.settings.poll_interval).await;
        }

        if state.responses_examined == 0 {
            engine_info!("{subject}: expected endpoint never answered within {window:?}");
            return Err(AttemptFailure::Unavailable(
                UnavailableReason::EndpointSilent,
            ));
        }
        engine_warn!(
            "{subject}: {} responses seen but no usable record",
            state.responses_examined
        );
        Ok(state.finish(AttemptStatus::Partial))
    }

    async fn advance(&self, page: &mut dyn BrowserPage) -> Result<(), AttemptFailure> {
        bounded(ADVANCE_LIMIT, page.advance())
            .await
            .map_err(|err| AttemptFailure::Internal(format!("advance failed: {err}")))
    }

    fn enter(&self, target: &CollectionTarget, phase: AttemptPhase) {
        self.sink.emit(EngineEvent::PhaseEntered {
            subject: target.subject_id().to_string(),
            phase,
        });
    }
}

fn log_rejected(subject: &str, response: &CapturedResponse, outcome: &ClassifiedOutcome) {
    match outcome {
        ClassifiedOutcome::Skipped(reason) => {
            engine_debug!("{subject}: skipped {} ({reason})", response.url);
        }
        ClassifiedOutcome::Malformed(err) => {
            let body = response.body_text().unwrap_or_default();
            engine_warn!(
                "{subject}: malformed body from {}: {err}. Text: {}",
                response.url,
                excerpt(&body, EXCERPT_CHARS)
            );
        }
        ClassifiedOutcome::Accepted(_) | ClassifiedOutcome::RateLimited(_) => {}
    }
}
