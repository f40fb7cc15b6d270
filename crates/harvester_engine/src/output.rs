//! Per-subject artifacts under `<root>/<handle>/`.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info};
use harvester_core::{CollectionResult, CollectionStatus, Mode};
use serde::Serialize;
use serde_json::Value;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::SubjectOutcome;

/// Produces the `finished_at` stamp of status files.
pub type Timestamp = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationStatus {
    pub operation: &'static str,
    pub status: CollectionStatus,
    pub records: usize,
}

impl OperationStatus {
    pub fn new(mode: Mode, result: &CollectionResult) -> Self {
        Self {
            operation: mode.label(),
            status: result.status,
            records: result.records.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectStatus {
    pub subject: String,
    pub outcome: SubjectOutcome,
    pub finished_at: String,
    pub operations: Vec<OperationStatus>,
}

#[derive(Clone)]
pub struct OutputStore {
    root: PathBuf,
    desired_count: usize,
    timestamp: Timestamp,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>, desired_count: usize, timestamp: Timestamp) -> Self {
        Self {
            root: root.into(),
            desired_count,
            timestamp,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subject_dir(&self, handle: &str) -> PathBuf {
        self.root.join(handle)
    }

    pub fn records_filename(&self, handle: &str, mode: Mode) -> String {
        match mode {
            Mode::Paginated => format!("{handle}_last_{}_tweets.json", self.desired_count),
            Mode::SingleRecord => format!("{handle}_user_profile_info.json"),
        }
    }

    pub fn status_filename(handle: &str) -> String {
        format!("{handle}_status.json")
    }

    /// Subject directory for `handle`, refused unless it is a direct child of
    /// the root.
    fn checked_subject_dir(&self, handle: &str) -> Result<PathBuf, PersistError> {
        let mut components = Path::new(handle).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.subject_dir(handle)),
            _ => Err(PersistError::OutputDir {
                path: self.subject_dir(handle),
                message: format!("{handle:?} is not a subject directory name"),
            }),
        }
    }

    /// Creates the subject directory if needed.
    pub fn prepare_subject(&self, handle: &str) -> Result<PathBuf, PersistError> {
        let dir = self.checked_subject_dir(handle)?;
        crate::persist::ensure_output_dir(&dir)?;
        Ok(dir)
    }

    /// Deletes everything written for `handle`. Returns whether anything existed.
    pub fn remove_subject(&self, handle: &str) -> Result<bool, PersistError> {
        let dir = self.checked_subject_dir(handle)?;
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        engine_info!("removed {}", dir.display());
        Ok(true)
    }

    /// Writes the records of one operation as a JSON array. An empty result
    /// writes nothing and yields `None`.
    pub fn write_records(
        &self,
        handle: &str,
        mode: Mode,
        result: &CollectionResult,
    ) -> Result<Option<PathBuf>, PersistError> {
        if result.is_empty() {
            engine_debug!("{handle}: no {} records, nothing written", mode.label());
            return Ok(None);
        }
        let values: Vec<&Value> = result.records.iter().map(|record| record.value()).collect();
        let writer = AtomicFileWriter::new(self.subject_dir(handle));
        let path = writer.write_json(&self.records_filename(handle, mode), &values)?;
        engine_info!(
            "{handle}: saved {} {} records to {}",
            values.len(),
            mode.label(),
            path.display()
        );
        Ok(Some(path))
    }

    pub fn write_status(
        &self,
        handle: &str,
        outcome: SubjectOutcome,
        operations: Vec<OperationStatus>,
    ) -> Result<PathBuf, PersistError> {
        let status = SubjectStatus {
            subject: handle.to_string(),
            outcome,
            finished_at: (self.timestamp)(),
            operations,
        };
        AtomicFileWriter::new(self.subject_dir(handle))
            .write_json(&Self::status_filename(handle), &status)
    }
}
