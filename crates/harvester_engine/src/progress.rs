use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::{EngineEvent, RetryTier, SubjectOutcome};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Writes events to the log facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::AttemptStarted {
                subject,
                mode,
                attempt,
            } => {
                engine_info!("{subject}: {} attempt {attempt}", mode.label());
            }
            EngineEvent::PhaseEntered { subject, phase } => {
                engine_debug!("{subject}: entering {phase:?}");
            }
            EngineEvent::RetryScheduled {
                subject,
                tier,
                attempt,
                delay,
                reason,
            } => {
                let tier = match tier {
                    RetryTier::Local => "local",
                    RetryTier::Global => "global",
                };
                engine_warn!(
                    "{subject}: {reason}, {tier} retry {attempt} in {}s",
                    delay.as_secs_f64()
                );
            }
            EngineEvent::SessionRebuilt { attempt, ready } => {
                engine_info!("session rebuilt (global attempt {attempt}), ready={ready}");
            }
            EngineEvent::SubjectFinished { subject, outcome } => match outcome {
                SubjectOutcome::Completed | SubjectOutcome::SkippedKnownProblem => {
                    engine_info!("{subject}: finished as {outcome:?}");
                }
                _ => engine_warn!("{subject}: finished as {outcome:?}"),
            },
        }
    }
}
