//! Append-only, file-backed list of subjects known to be unavailable.
//!
//! One subject id per line, stored exactly as listed in the input. Lookups
//! compare trimmed ids for equality.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};
use harvester_core::parse_subject_list;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read registry {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not append to registry {}: {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct ProblemRegistry {
    path: PathBuf,
    entries: HashSet<String>,
    needs_newline: bool,
}

impl ProblemRegistry {
    /// Loads the registry; a missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(RegistryError::Read { path, source }),
        };
        let entries: HashSet<String> = parse_subject_list(&raw).into_iter().collect();
        engine_debug!(
            "registry {} holds {} subjects",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            needs_newline: !raw.is_empty() && !raw.ends_with('\n'),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, subject_id: &str) -> bool {
        self.entries.contains(subject_id.trim())
    }

    /// Appends `subject_id` unless already present. Returns whether a line was written.
    pub fn add(&mut self, subject_id: &str) -> Result<bool, RegistryError> {
        let subject_id = subject_id.trim();
        if subject_id.is_empty() || self.contains(subject_id) {
            return Ok(false);
        }

        let append_error = |source| RegistryError::Append {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(append_error)?;
        let prefix = if self.needs_newline { "\n" } else { "" };
        writeln!(file, "{prefix}{subject_id}").map_err(append_error)?;

        self.needs_newline = false;
        self.entries.insert(subject_id.to_string());
        engine_info!("{subject_id} added to {}", self.path.display());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
