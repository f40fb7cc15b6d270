use engine_logging::{engine_info, engine_warn};
use serde::Serialize;
use tokio::time::sleep;

use crate::global::{GlobalRetryController, HarvestError};
use crate::SubjectOutcome;

/// Subject outcome counts for a whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub partial: usize,
    pub abandoned: usize,
    pub unavailable: usize,
    pub skipped: usize,
    pub invalid: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: SubjectOutcome) {
        let slot = match outcome {
            SubjectOutcome::Completed => &mut self.completed,
            SubjectOutcome::Partial => &mut self.partial,
            SubjectOutcome::Abandoned => &mut self.abandoned,
            SubjectOutcome::Unavailable => &mut self.unavailable,
            SubjectOutcome::SkippedKnownProblem => &mut self.skipped,
            SubjectOutcome::SkippedInvalid => &mut self.invalid,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.completed
            + self.partial
            + self.abandoned
            + self.unavailable
            + self.skipped
            + self.invalid
    }
}

/// Processes `subjects` in order on one controller, pausing between subjects
/// that actually hit the network. The session is closed on every exit path.
pub async fn run_subjects(
    controller: &mut GlobalRetryController,
    subjects: &[String],
) -> Result<RunSummary, HarvestError> {
    let result = process_all(controller, subjects).await;
    controller.shutdown().await;
    result
}

async fn process_all(
    controller: &mut GlobalRetryController,
    subjects: &[String],
) -> Result<RunSummary, HarvestError> {
    let mut summary = RunSummary::default();
    if subjects.is_empty() {
        engine_warn!("no subjects to process");
        return Ok(summary);
    }
    if !controller.start().await? {
        engine_warn!("initial login failed, results may be limited");
    }

    let pause = controller.settings().inter_subject_pause;
    for (index, subject) in subjects.iter().enumerate() {
        engine_info!("[{}/{}] processing {subject}", index + 1, subjects.len());
        let outcome = controller.process_subject(subject).await;
        summary.record(outcome);

        let more = index + 1 < subjects.len();
        let skipped = matches!(
            outcome,
            SubjectOutcome::SkippedKnownProblem | SubjectOutcome::SkippedInvalid
        );
        if more && !skipped {
            sleep(pause).await;
        }
    }

    engine_info!(
        "run finished: {} subjects, {} completed, {} partial, {} abandoned, {} unavailable, {} skipped, {} invalid",
        summary.total(),
        summary.completed,
        summary.partial,
        summary.abandoned,
        summary.unavailable,
        summary.skipped,
        summary.invalid
    );
    Ok(summary)
}
