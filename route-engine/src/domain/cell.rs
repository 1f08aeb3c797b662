//! Grid coordinates and regions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// Identifier of a disjoint region of space (a separate level or map).
///
/// Cells in different domains have no spatial relationship; the only way
/// between them is a [`Tunnel`](super::Tunnel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Domain(pub u32);

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// An integer grid coordinate within a domain.
///
/// Equality and hashing are structural, so a `Cell` can key a visited map
/// directly.
///
/// # Examples
///
/// ```
/// use route_engine::domain::{Cell, Domain};
///
/// let a = Cell::new(0, 64, 0, Domain(0));
/// let b = Cell::new(3, 64, 4, Domain(0));
/// assert_eq!(a.distance_to(&b), Some(5.0));
///
/// // Distances across domains are undefined
/// let c = Cell::new(3, 64, 4, Domain(1));
/// assert_eq!(a.distance_to(&c), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub domain: Domain,
}

impl Cell {
    /// Creates a new cell.
    pub const fn new(x: i32, y: i32, z: i32, domain: Domain) -> Self {
        Self { x, y, z, domain }
    }

    /// Returns the cell offset by the given deltas, in the same domain.
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
            self.domain,
        )
    }

    /// Squared Euclidean distance, or `None` across domains.
    pub fn distance_to_squared(&self, other: &Cell) -> Option<f64> {
        if self.domain != other.domain {
            return None;
        }
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        Some(dx * dx + dy * dy + dz * dz)
    }

    /// Euclidean distance, or `None` across domains.
    pub fn distance_to(&self, other: &Cell) -> Option<f64> {
        self.distance_to_squared(other).map(f64::sqrt)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}) @ {}", self.x, self.y, self.z, self.domain)
    }
}

/// An axis-aligned inclusive box of cells within one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellBox {
    min: Cell,
    max: Cell,
}

impl CellBox {
    /// Creates a box spanning two corners, in any order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the corners lie in different domains.
    pub fn new(a: Cell, b: Cell) -> Result<Self, DomainError> {
        if a.domain != b.domain {
            return Err(DomainError::CrossDomainBox(a.domain, b.domain));
        }
        Ok(Self {
            min: Cell::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z), a.domain),
            max: Cell::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z), a.domain),
        })
    }

    pub fn min(&self) -> Cell {
        self.min
    }

    pub fn max(&self) -> Cell {
        self.max
    }

    pub fn domain(&self) -> Domain {
        self.min.domain
    }

    /// Returns true if the cell lies inside the box (inclusive).
    pub fn contains(&self, cell: &Cell) -> bool {
        cell.domain == self.domain()
            && (self.min.x..=self.max.x).contains(&cell.x)
            && (self.min.y..=self.max.y).contains(&cell.y)
            && (self.min.z..=self.max.z).contains(&cell.z)
    }

    /// The cell of the box nearest to `cell`, by clamping each axis.
    ///
    /// The result is always in the box's domain, even when `cell` is not.
    pub fn nearest_to(&self, cell: &Cell) -> Cell {
        Cell::new(
            cell.x.clamp(self.min.x, self.max.x),
            cell.y.clamp(self.min.y, self.max.y),
            cell.z.clamp(self.min.z, self.max.z),
            self.domain(),
        )
    }

    /// Number of cells covered by the box.
    pub fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u64;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }
}
