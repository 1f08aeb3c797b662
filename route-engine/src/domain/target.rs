//! Search targets.

use std::fmt;
use std::sync::Arc;

use super::{Cell, CellBox, Domain};

/// Supplies the current position of a moving target, or `None` if it has
/// vanished.
pub type CellSupplier = Arc<dyn Fn() -> Option<Cell> + Send + Sync>;

/// Something a search can aim for.
///
/// `get` resolves the concrete point to steer towards, while
/// `is_satisfied_by` decides arrival. The two are independent: a region
/// is satisfied by any cell inside it, not just the one `get` returns.
#[derive(Clone)]
pub enum Target {
    /// A single fixed cell
    Cell(Cell),
    /// Any cell within a box
    Region(CellBox),
    /// A point that may move between calls
    Moving { domain: Domain, supplier: CellSupplier },
}

impl Target {
    /// Creates a moving target in `domain` backed by `supplier`.
    pub fn moving<F>(domain: Domain, supplier: F) -> Self
    where
        F: Fn() -> Option<Cell> + Send + Sync + 'static,
    {
        Target::Moving {
            domain,
            supplier: Arc::new(supplier),
        }
    }

    /// The domain this target lives in.
    pub fn domain(&self) -> Domain {
        match self {
            Target::Cell(cell) => cell.domain,
            Target::Region(region) => region.domain(),
            Target::Moving { domain, .. } => *domain,
        }
    }

    /// Resolves the point to aim for when approaching from `origin`.
    ///
    /// Returns `None` if a moving target is currently unresolvable, or if
    /// it has wandered out of its declared domain.
    pub fn get(&self, origin: &Cell) -> Option<Cell> {
        match self {
            Target::Cell(cell) => Some(*cell),
            Target::Region(region) => Some(region.nearest_to(origin)),
            Target::Moving { domain, supplier } => {
                supplier().filter(|cell| cell.domain == *domain)
            }
        }
    }

    /// Returns true if standing at `cell` counts as arrival.
    pub fn is_satisfied_by(&self, cell: &Cell) -> bool {
        match self {
            Target::Cell(target) => target == cell,
            Target::Region(region) => region.contains(cell),
            Target::Moving { supplier, .. } => supplier().is_some_and(|target| target == *cell),
        }
    }

    /// Freezes a moving target at its current position.
    ///
    /// Stationary targets are returned unchanged. Returns `None` if a
    /// moving target cannot currently be resolved.
    pub fn snapshot(&self) -> Option<Target> {
        match self {
            Target::Moving { domain, supplier } => supplier()
                .filter(|cell| cell.domain == *domain)
                .map(Target::Cell),
            other => Some(other.clone()),
        }
    }

    /// The fixed cell, if this target is a single stationary cell.
    pub fn fixed_cell(&self) -> Option<Cell> {
        match self {
            Target::Cell(cell) => Some(*cell),
            _ => None,
        }
    }

    /// Returns true if the target can move.
    pub fn is_moving(&self) -> bool {
        matches!(self, Target::Moving { .. })
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
            Target::Region(region) => f.debug_tuple("Region").field(region).finish(),
            Target::Moving { domain, .. } => f.debug_struct("Moving").field("domain", domain).finish(),
        }
    }
}

impl From<Cell> for Target {
    fn from(cell: Cell) -> Self {
        Target::Cell(cell)
    }
}

impl From<CellBox> for Target {
    fn from(region: CellBox) -> Self {
        Target::Region(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const D: Domain = Domain(0);

    #[test]
    fn cell_target() {
        let cell = Cell::new(1, 2, 3, D);
        let target = Target::from(cell);
        assert_eq!(target.domain(), D);
        assert_eq!(target.get(&Cell::new(0, 0, 0, D)), Some(cell));
        assert!(target.is_satisfied_by(&cell));
        assert!(!target.is_satisfied_by(&cell.offset(1, 0, 0)));
        assert_eq!(target.fixed_cell(), Some(cell));
    }

    #[test]
    fn region_target_aims_at_nearest_cell() {
        let region = CellBox::new(Cell::new(10, 0, 10, D), Cell::new(12, 2, 12, D)).unwrap();
        let target = Target::from(region);

        assert_eq!(target.get(&Cell::new(0, 1, 11, D)), Some(Cell::new(10, 1, 11, D)));
        assert!(target.is_satisfied_by(&Cell::new(12, 2, 11, D)));
        assert!(!target.is_satisfied_by(&Cell::new(13, 2, 11, D)));
        assert_eq!(target.fixed_cell(), None);
    }

    #[test]
    fn moving_target_follows_supplier() {
        let position = Arc::new(Mutex::new(Some(Cell::new(0, 0, 0, D))));
        let source = position.clone();
        let target = Target::moving(D, move || *source.lock().unwrap());

        let origin = Cell::new(5, 5, 5, D);
        assert_eq!(target.get(&origin), Some(Cell::new(0, 0, 0, D)));

        *position.lock().unwrap() = Some(Cell::new(3, 0, 0, D));
        assert_eq!(target.get(&origin), Some(Cell::new(3, 0, 0, D)));
        assert!(target.is_satisfied_by(&Cell::new(3, 0, 0, D)));

        *position.lock().unwrap() = None;
        assert_eq!(target.get(&origin), None);
        assert!(target.snapshot().is_none());
    }

    #[test]
    fn moving_target_outside_domain_is_unresolvable() {
        let target = Target::moving(D, || Some(Cell::new(0, 0, 0, Domain(9))));
        assert_eq!(target.get(&Cell::new(0, 0, 0, D)), None);
    }

    #[test]
    fn snapshot_freezes_moving_target() {
        let target = Target::moving(D, || Some(Cell::new(7, 0, 7, D)));
        let frozen = target.snapshot().unwrap();
        assert!(!frozen.is_moving());
        assert_eq!(frozen.fixed_cell(), Some(Cell::new(7, 0, 7, D)));
    }
}
