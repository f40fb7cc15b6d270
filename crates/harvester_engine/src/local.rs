//! In-session retry tier around [`AttemptDriver`].

use engine_logging::engine_error;
use harvester_core::{
    CollectionResult, CollectionStatus, CollectionTarget, LocalRetry, RetryDecision,
};
use tokio::time::sleep;

use crate::automation::BrowserSession;
use crate::driver::AttemptDriver;
use crate::{
    AttemptFailure, AttemptOutcome, AttemptStatus, EngineEvent, Escalation, HarvestSettings,
    ProgressSink, RetryTier,
};

pub struct LocalRetryController<'a> {
    settings: &'a HarvestSettings,
    sink: &'a dyn ProgressSink,
}

impl<'a> LocalRetryController<'a> {
    pub fn new(settings: &'a HarvestSettings, sink: &'a dyn ProgressSink) -> Self {
        Self { settings, sink }
    }

    /// Runs attempts until one yields an outcome, the subject proves
    /// unavailable, or the shared attempt budget runs out.
    ///
    /// Exhausting the budget on throttling escalates; exhausting it on any
    /// other transient fault abandons the operation.
    pub async fn collect(
        &self,
        session: &mut dyn BrowserSession,
        target: &CollectionTarget,
    ) -> Result<CollectionResult, Escalation> {
        let subject = target.subject_id();
        let budget = self.settings.operation_timeout(target.mode());
        let driver = AttemptDriver::new(self.settings, self.sink);
        let mut retry = LocalRetry::new(
            self.settings.local_retry_state(),
            self.settings.generic_retry_delay,
        );

        loop {
            self.sink.emit(EngineEvent::AttemptStarted {
                subject: subject.to_string(),
                mode: target.mode(),
                attempt: retry.attempts_made() + 1,
            });

            let failure = match driver.run(session, target, budget).await {
                Ok(outcome) => return Ok(into_result(outcome)),
                Err(failure) => failure,
            };

            let decision = match &failure {
                AttemptFailure::Unavailable(reason) => {
                    return Err(Escalation::Unavailable(reason.clone()));
                }
                AttemptFailure::RateLimited { .. } => retry.on_throttled(),
                AttemptFailure::Timeout { .. } | AttemptFailure::Internal(_) => retry.on_generic(),
            };

            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    self.sink.emit(EngineEvent::RetryScheduled {
                        subject: subject.to_string(),
                        tier: RetryTier::Local,
                        attempt,
                        delay,
                        reason: failure.class(),
                    });
                    sleep(delay).await;
                }
                RetryDecision::Exhausted => match failure {
                    AttemptFailure::RateLimited { evidence } => {
                        return Err(Escalation::RateLimited { evidence });
                    }
                    other => {
                        engine_error!(
                            "{subject}: {} abandoned after {} attempts, last error: {other}",
                            target.mode().label(),
                            retry.attempts_made()
                        );
                        return Ok(CollectionResult::abandoned());
                    }
                },
            }
        }
    }
}

fn into_result(outcome: AttemptOutcome) -> CollectionResult {
    let status = match outcome.status {
        AttemptStatus::Complete => CollectionStatus::Complete,
        AttemptStatus::Partial => CollectionStatus::PartialTimeout,
    };
    CollectionResult {
        records: outcome.records,
        status,
    }
}
