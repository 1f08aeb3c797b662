//! In-memory record store.

use std::sync::{PoisonError, RwLock};

use super::{PathRecord, PathRecordStore, RecordError, RecordTable};
use crate::domain::{Cell, ModeSet};

/// Record store held entirely in memory.
///
/// Pruning and insertion happen under one write lock, so readers see either
/// the table before a put or after it.
#[derive(Debug, Default)]
pub struct MemoryPathRecordStore {
    table: RwLock<RecordTable>,
}

impl MemoryPathRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from existing records, pruning as they are added.
    pub fn with_records(records: impl IntoIterator<Item = PathRecord>) -> Self {
        Self {
            table: RwLock::new(RecordTable::from_records(records)),
        }
    }
}

impl PathRecordStore for MemoryPathRecordStore {
    fn get(&self, origin: &Cell, destination: &Cell, modes: &ModeSet) -> Option<PathRecord> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.best(origin, destination, modes).cloned()
    }

    fn put(&self, record: PathRecord) -> Result<bool, RecordError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        Ok(table.insert(record))
    }

    fn total_cached_cells(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).cells
    }

    fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn truncate(&self) -> Result<(), RecordError> {
        self.table.write().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}
