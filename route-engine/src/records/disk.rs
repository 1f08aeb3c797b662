//! File-backed record store.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PathRecord, PathRecordStore, RecordError, RecordTable};
use crate::domain::{Cell, ModeSet};

/// On-disk snapshot of every record.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    records: Vec<PathRecord>,
}

/// Record store persisted as a JSON file.
///
/// The whole table is rewritten after each change: the snapshot goes to a
/// sibling temporary file first and is then renamed over the real one, so
/// the file on disk is always a complete snapshot.
#[derive(Debug)]
pub struct FilePathRecordStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
}

impl FilePathRecordStore {
    /// Opens the store at `path`, loading any records already saved there.
    ///
    /// A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let path = path.into();
        let table = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let snapshot: Snapshot = serde_json::from_str(&contents)?;
                debug!(path = %path.display(), records = snapshot.records.len(), "loaded path records");
                RecordTable::from_records(snapshot.records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecordTable::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &RecordTable) -> Result<(), RecordError> {
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            records: table.iter().cloned().collect(),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PathRecordStore for FilePathRecordStore {
    fn get(&self, origin: &Cell, destination: &Cell, modes: &ModeSet) -> Option<PathRecord> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.best(origin, destination, modes).cloned()
    }

    fn put(&self, record: PathRecord) -> Result<bool, RecordError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        // the live table only changes once the new snapshot is on disk
        let mut next = table.clone();
        if !next.insert(record) {
            return Ok(false);
        }
        self.persist(&next)?;
        *table = next;
        Ok(true)
    }

    fn total_cached_cells(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).cells
    }

    fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn truncate(&self) -> Result<(), RecordError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&RecordTable::default())?;
        table.clear();
        Ok(())
    }
}
