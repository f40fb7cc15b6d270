use std::collections::HashSet;

use crate::{CollectionTarget, Record};

/// Insertion-ordered, key-deduplicated record buffer for one attempt.
///
/// `records` and `seen` always hold the same keys, and `records.len()` never
/// exceeds the capacity derived from the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    records: Vec<Record>,
    seen: HashSet<String>,
    capacity: usize,
}

impl Accumulator {
    pub fn for_target(target: &CollectionTarget) -> Self {
        Self::with_capacity(target.desired_count())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Inserts `record` unless its key was already seen or the buffer is full.
    pub fn offer(&mut self, record: Record) -> bool {
        if self.is_full() || self.seen.contains(record.key()) {
            return false;
        }
        self.seen.insert(record.key().to_string());
        self.records.push(record);
        true
    }

    /// Offers records in order and stops as soon as the buffer fills.
    /// Returns how many were inserted.
    pub fn offer_all(&mut self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut inserted = 0;
        for record in records {
            if self.is_full() {
                break;
            }
            if self.offer(record) {
                inserted += 1;
            }
        }
        inserted
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
