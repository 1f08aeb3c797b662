//! Caching layer for terrain lookups.
//!
//! Movement modes query the same few cells many times while a frontier
//! grows around them. Each session wraps its block provider in a bounded
//! cache so repeated probes are answered without touching the provider.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache as MokaCache;

use crate::domain::{Cell, CellBox};
use crate::navigation::BlockProvider;

/// Configuration for the block cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached cells.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 4096,
        }
    }
}

/// Everything a mode can ask about one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockInfo {
    passable: bool,
    surface: bool,
    door: bool,
    diggable: bool,
}

impl BlockInfo {
    fn probe(blocks: &dyn BlockProvider, cell: &Cell) -> Self {
        Self {
            passable: blocks.is_passable(cell),
            surface: blocks.is_surface(cell),
            door: blocks.is_door(cell),
            diggable: blocks.is_diggable(cell),
        }
    }
}

/// Block provider with caching.
///
/// Wraps another provider and remembers every cell it has been asked about.
pub struct CachedBlockProvider {
    inner: Arc<dyn BlockProvider>,
    cells: MokaCache<Cell, BlockInfo>,
}

impl CachedBlockProvider {
    /// Create a new cached provider.
    pub fn new(inner: Arc<dyn BlockProvider>, config: &CacheConfig) -> Self {
        let cells = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, cells }
    }

    fn info(&self, cell: &Cell) -> BlockInfo {
        self.cells.get_with(*cell, || BlockInfo::probe(self.inner.as_ref(), cell))
    }

    /// Get cache statistics.
    pub fn cache_entry_count(&self) -> u64 {
        self.cells.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_cache(&self) {
        self.cells.invalidate_all();
    }
}

impl BlockProvider for CachedBlockProvider {
    fn is_passable(&self, cell: &Cell) -> bool {
        self.info(cell).passable
    }

    fn is_surface(&self, cell: &Cell) -> bool {
        self.info(cell).surface
    }

    fn is_door(&self, cell: &Cell) -> bool {
        self.info(cell).door
    }

    fn is_diggable(&self, cell: &Cell) -> bool {
        self.info(cell).diggable
    }

    fn prefetch(&self, region: &CellBox) {
        self.inner.prefetch(region);
    }
}
