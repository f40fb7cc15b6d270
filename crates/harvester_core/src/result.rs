use serde::Serialize;

use crate::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Complete,
    PartialTimeout,
    Abandoned,
}

/// Final output of one operation, handed to callers by value.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionResult {
    pub records: Vec<Record>,
    pub status: CollectionStatus,
}

impl CollectionResult {
    pub fn abandoned() -> Self {
        Self {
            records: Vec::new(),
            status: CollectionStatus::Abandoned,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
