//! Persisted path records.
//!
//! A record remembers a path found between two cells together with the
//! movement kinds it needed. Stores keep, per (origin, destination) pair,
//! only records that no other record dominates: a record dominates another
//! when it is no more expensive and needs no more modes.

mod disk;
mod error;
mod memory;

pub use disk::FilePathRecordStore;
pub use error::RecordError;
pub use memory::MemoryPathRecordStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Cell, ModeSet, Path};

/// A previously computed path between two cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    path: Path,
    modes: ModeSet,
    recorded_at: DateTime<Utc>,
    search_duration: Duration,
}

impl PathRecord {
    /// Records `path`, which took `search_duration` to find.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the path leaves its origin's domain.
    pub fn new(path: Path, search_duration: Duration) -> Result<Self, RecordError> {
        let domain = path.origin().domain;
        if path.steps().iter().any(|s| s.cell.domain != domain) {
            return Err(RecordError::Invalid {
                message: format!("path from {} crosses domains", path.origin()),
            });
        }
        Ok(Self {
            modes: path.mode_types(),
            path,
            recorded_at: Utc::now(),
            search_duration,
        })
    }

    /// Overrides the recording time.
    pub fn with_recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    pub fn origin(&self) -> Cell {
        self.path.origin()
    }

    pub fn destination(&self) -> Cell {
        self.path.destination()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cost(&self) -> f64 {
        self.path.cost()
    }

    /// Movement kinds the path needs.
    pub fn modes(&self) -> ModeSet {
        self.modes
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn search_duration(&self) -> Duration {
        self.search_duration
    }

    /// Number of cells this record holds.
    pub fn cell_count(&self) -> usize {
        self.path.len()
    }

    /// Returns true if `self` makes `other` redundant.
    pub fn dominates(&self, other: &PathRecord) -> bool {
        self.origin() == other.origin()
            && self.destination() == other.destination()
            && self.cost() <= other.cost()
            && self.modes.is_subset(&other.modes)
    }

    fn key(&self) -> (Cell, Cell) {
        (self.origin(), self.destination())
    }
}

/// Storage for path records.
///
/// Implementations must apply the dominance rule on every [`put`] and must
/// make each put atomic with respect to concurrent [`get`] calls.
///
/// [`put`]: PathRecordStore::put
/// [`get`]: PathRecordStore::get
pub trait PathRecordStore: Send + Sync {
    /// Returns the cheapest record from `origin` to `destination` that
    /// needs only modes in `modes`.
    ///
    /// Both cells carry the domain, so records never match across domains.
    fn get(&self, origin: &Cell, destination: &Cell, modes: &ModeSet) -> Option<PathRecord>;

    /// Stores `record` unless an existing record dominates it, removing any
    /// records it dominates. Returns whether the record was stored.
    fn put(&self, record: PathRecord) -> Result<bool, RecordError>;

    /// Total cells across all stored records.
    fn total_cached_cells(&self) -> usize;

    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every record.
    fn truncate(&self) -> Result<(), RecordError>;
}

/// Dominance-pruned records grouped by endpoint pair.
#[derive(Debug, Default, Clone)]
struct RecordTable {
    records: HashMap<(Cell, Cell), Vec<PathRecord>>,
    cells: usize,
}

impl RecordTable {
    fn from_records(records: impl IntoIterator<Item = PathRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.insert(record);
        }
        table
    }

    fn best(&self, origin: &Cell, destination: &Cell, modes: &ModeSet) -> Option<&PathRecord> {
        self.records
            .get(&(*origin, *destination))?
            .iter()
            .filter(|r| r.modes.is_subset(modes))
            .min_by(|a, b| a.cost().total_cmp(&b.cost()))
    }

    fn insert(&mut self, record: PathRecord) -> bool {
        let bucket = self.records.entry(record.key()).or_default();
        if bucket.iter().any(|existing| existing.dominates(&record)) {
            return false;
        }

        let before: usize = bucket.iter().map(PathRecord::cell_count).sum();
        bucket.retain(|existing| !record.dominates(existing));
        let after: usize = bucket.iter().map(PathRecord::cell_count).sum();

        self.cells = self.cells - before + after + record.cell_count();
        bucket.push(record);
        true
    }

    fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    fn iter(&self) -> impl Iterator<Item = &PathRecord> {
        self.records.values().flatten()
    }

    fn clear(&mut self) {
        self.records.clear();
        self.cells = 0;
    }
}

/// The record store as seen by path trials.
///
/// Adds the global cap on cached cells: once the store holds
/// `max_cached_cells`, further saves are skipped and a warning is logged
/// the first time.
pub struct PathRecordCache {
    store: Arc<dyn PathRecordStore>,
    max_cached_cells: usize,
    cap_warned: AtomicBool,
}

impl PathRecordCache {
    pub fn new(store: Arc<dyn PathRecordStore>, max_cached_cells: usize) -> Self {
        Self {
            store,
            max_cached_cells,
            cap_warned: AtomicBool::new(false),
        }
    }

    /// Looks up a reusable path.
    pub fn lookup(&self, origin: &Cell, destination: &Cell, modes: &ModeSet) -> Option<PathRecord> {
        self.store.get(origin, destination, modes)
    }

    /// Saves a found path. Returns whether it was stored.
    ///
    /// Store failures are logged rather than returned: a trial that found
    /// its path has succeeded regardless of whether the path was cached.
    pub fn save(&self, record: PathRecord) -> bool {
        let total = self.store.total_cached_cells();
        if total + record.cell_count() > self.max_cached_cells {
            if !self.cap_warned.swap(true, Ordering::Relaxed) {
                warn!(
                    total,
                    max = self.max_cached_cells,
                    "path record cache is full; new paths will not be cached"
                );
            }
            return false;
        }

        let origin = record.origin();
        let destination = record.destination();
        match self.store.put(record) {
            Ok(stored) => {
                debug!(%origin, %destination, stored, "saved path record");
                stored
            }
            Err(e) => {
                warn!(%origin, %destination, error = %e, "failed to save path record");
                false
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn PathRecordStore> {
        &self.store
    }

    pub fn max_cached_cells(&self) -> usize {
        self.max_cached_cells
    }
}
