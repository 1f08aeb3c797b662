//! Terrain access.

use std::collections::{HashMap, HashSet};

use crate::domain::{Cell, CellBox, Domain};

/// Read access to terrain.
///
/// Calls happen many times per search slice, so implementations must
/// answer from memory without blocking. Anything slow belongs in
/// [`prefetch`](BlockProvider::prefetch).
pub trait BlockProvider: Send + Sync {
    /// Returns true if a traveler can occupy `cell`.
    fn is_passable(&self, cell: &Cell) -> bool;

    /// Returns true if a traveler at `cell` has solid footing beneath it.
    fn is_surface(&self, cell: &Cell) -> bool;

    /// Returns true if `cell` holds a closed door that can be opened.
    fn is_door(&self, _cell: &Cell) -> bool {
        false
    }

    /// Returns true if `cell` is solid but can be dug through.
    fn is_diggable(&self, cell: &Cell) -> bool {
        !self.is_passable(cell)
    }

    /// Hints that cells in `region` will be needed soon.
    fn prefetch(&self, _region: &CellBox) {}
}

/// An in-memory voxel world.
///
/// Each domain has inclusive bounds; cells outside them are solid and
/// unbreakable. Inside, cells are open unless marked solid or door.
#[derive(Debug, Clone, Default)]
pub struct GridWorld {
    bounds: HashMap<Domain, CellBox>,
    solid: HashSet<Cell>,
    doors: HashSet<Cell>,
    unbreakable: HashSet<Cell>,
}

impl GridWorld {
    /// Create a builder.
    pub fn builder() -> GridWorldBuilder {
        GridWorldBuilder::default()
    }

    fn in_bounds(&self, cell: &Cell) -> bool {
        self.bounds.get(&cell.domain).is_some_and(|b| b.contains(cell))
    }

    fn is_solid(&self, cell: &Cell) -> bool {
        !self.in_bounds(cell) || self.solid.contains(cell) || self.doors.contains(cell)
    }

    /// Returns the number of solid cells placed explicitly.
    pub fn solid_count(&self) -> usize {
        self.solid.len()
    }
}

impl BlockProvider for GridWorld {
    fn is_passable(&self, cell: &Cell) -> bool {
        !self.is_solid(cell)
    }

    fn is_surface(&self, cell: &Cell) -> bool {
        let below = cell.offset(0, -1, 0);
        !self.is_solid(cell) && (self.solid.contains(&below) || self.doors.contains(&below))
    }

    fn is_door(&self, cell: &Cell) -> bool {
        self.doors.contains(cell)
    }

    fn is_diggable(&self, cell: &Cell) -> bool {
        self.in_bounds(cell) && self.solid.contains(cell) && !self.unbreakable.contains(cell)
    }
}

/// Builder for creating grid worlds.
///
/// Provides a fluent API for laying out terrain.
#[derive(Debug, Default)]
pub struct GridWorldBuilder {
    inner: GridWorld,
}

impl GridWorldBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounds of a domain. Later calls replace earlier ones.
    pub fn bounds(mut self, region: CellBox) -> Self {
        self.inner.bounds.insert(region.domain(), region);
        self
    }

    /// Fill the horizontal span of `region` at height `y` with solid ground.
    pub fn floor(mut self, region: CellBox, y: i32) -> Self {
        let (min, max) = (region.min(), region.max());
        for x in min.x..=max.x {
            for z in min.z..=max.z {
                self.inner.solid.insert(Cell::new(x, y, z, region.domain()));
            }
        }
        self
    }

    /// Fill every cell of `region` with solid terrain.
    pub fn fill(mut self, region: CellBox) -> Self {
        let (min, max) = (region.min(), region.max());
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.inner.solid.insert(Cell::new(x, y, z, region.domain()));
                }
            }
        }
        self
    }

    /// Mark a single cell solid.
    pub fn solid(mut self, cell: Cell) -> Self {
        self.inner.solid.insert(cell);
        self
    }

    /// Mark a cell solid and impossible to dig.
    pub fn unbreakable(mut self, cell: Cell) -> Self {
        self.inner.solid.insert(cell);
        self.inner.unbreakable.insert(cell);
        self
    }

    /// Place a closed door, replacing any solid terrain there.
    pub fn door(mut self, cell: Cell) -> Self {
        self.inner.solid.remove(&cell);
        self.inner.doors.insert(cell);
        self
    }

    /// Clear a cell back to open space.
    pub fn clear(mut self, cell: Cell) -> Self {
        self.inner.solid.remove(&cell);
        self.inner.doors.remove(&cell);
        self.inner.unbreakable.remove(&cell);
        self
    }

    /// Build the world.
    pub fn build(self) -> GridWorld {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Domain = Domain(0);

    fn region() -> CellBox {
        CellBox::new(Cell::new(0, 0, 0, D), Cell::new(9, 9, 9, D)).unwrap()
    }

    #[test]
    fn bounds_are_solid_outside() {
        let world = GridWorld::builder().bounds(region()).build();
        assert!(world.is_passable(&Cell::new(0, 5, 0, D)));
        assert!(!world.is_passable(&Cell::new(-1, 5, 0, D)));
        assert!(!world.is_passable(&Cell::new(0, 5, 0, Domain(3))));
        assert!(!world.is_diggable(&Cell::new(-1, 5, 0, D)));
    }

    #[test]
    fn floor_creates_surface() {
        let world = GridWorld::builder().bounds(region()).floor(region(), 0).build();
        assert!(!world.is_passable(&Cell::new(3, 0, 3, D)));
        assert!(world.is_surface(&Cell::new(3, 1, 3, D)));
        assert!(!world.is_surface(&Cell::new(3, 2, 3, D)));
        assert_eq!(world.solid_count(), 100);
    }

    #[test]
    fn doors_and_digging() {
        let door = Cell::new(2, 1, 2, D);
        let rock = Cell::new(3, 1, 2, D);
        let bedrock = Cell::new(4, 1, 2, D);
        let world = GridWorld::builder()
            .bounds(region())
            .floor(region(), 0)
            .door(door)
            .solid(rock)
            .unbreakable(bedrock)
            .build();

        assert!(world.is_door(&door));
        assert!(!world.is_passable(&door));
        assert!(world.is_diggable(&rock));
        assert!(!world.is_diggable(&bedrock));
        assert!(!world.is_diggable(&door));
    }

    #[test]
    fn clear_reopens_cell() {
        let cell = Cell::new(5, 5, 5, D);
        let world = GridWorld::builder().bounds(region()).solid(cell).clear(cell).build();
        assert!(world.is_passable(&cell));
    }
}
