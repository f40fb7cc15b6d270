use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use engine_logging::engine_info;
use harvester_core::parse_subject_list;
use harvester_engine::{
    ensure_output_dir, run_subjects, GlobalRetryController, LogProgressSink, OutputStore,
    ProblemRegistry, RunSummary, ScriptedBrowser,
};

use super::config;

/// Inputs of one harvesting run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub subjects: PathBuf,
    pub registry: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub replay: PathBuf,
}

pub fn run(options: &RunOptions) -> Result<RunSummary> {
    let settings = config::load_settings(options.config.as_deref())?;
    let subjects = load_subjects(&options.subjects)?;
    engine_info!(
        "{} subjects from {}",
        subjects.len(),
        options.subjects.display()
    );

    let browser = ScriptedBrowser::from_file(&options.replay)?;
    let registry = ProblemRegistry::open(&options.registry)?;
    ensure_output_dir(&options.output)?;
    let output = OutputStore::new(
        &options.output,
        settings.desired_count,
        Arc::new(|| Utc::now().to_rfc3339()),
    );

    let mut controller = GlobalRetryController::new(
        Arc::new(browser),
        settings,
        registry,
        output,
        Arc::new(LogProgressSink),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let summary = runtime.block_on(run_subjects(&mut controller, &subjects))?;
    Ok(summary)
}

/// Reads the subject list. A missing or empty list is an error.
pub fn load_subjects(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading subject list {}", path.display()))?;
    let subjects = parse_subject_list(&raw);
    if subjects.is_empty() {
        bail!("subject list {} is empty", path.display());
    }
    Ok(subjects)
}
