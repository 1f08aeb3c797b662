//! Distance estimates for informed search.

use crate::domain::Cell;

/// Estimates the remaining cost from a cell to a goal.
pub trait CostFunction: Send + Sync {
    fn estimate(&self, cell: &Cell) -> f64;
}

/// Straight-line distance, or `None` across domains.
pub fn euclidean(a: &Cell, b: &Cell) -> Option<f64> {
    a.distance_to(b)
}

/// Horizontal straight-line distance plus the full height difference.
///
/// Travelers climb in whole steps, so height costs more than the
/// Euclidean estimate admits. Used to rank trials that have not run yet.
pub fn planar_oriented(a: &Cell, b: &Cell) -> Option<f64> {
    if a.domain != b.domain {
        return None;
    }
    let dx = f64::from(a.x) - f64::from(b.x);
    let dz = f64::from(a.z) - f64::from(b.z);
    let dy = f64::from(a.y) - f64::from(b.y);
    Some((dx * dx + dz * dz).sqrt() + dy.abs())
}

/// Euclidean distance to a fixed aim, scaled by a weight.
///
/// A weight of 1 keeps the estimate admissible for modes whose step cost
/// is at least the distance moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedDistance {
    aim: Cell,
    weight: f64,
}

impl WeightedDistance {
    pub fn new(aim: Cell, weight: f64) -> Self {
        Self { aim, weight }
    }

    pub fn aim(&self) -> Cell {
        self.aim
    }
}

impl CostFunction for WeightedDistance {
    fn estimate(&self, cell: &Cell) -> f64 {
        euclidean(cell, &self.aim).map_or(0.0, |d| d * self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;

    #[test]
    fn planar_counts_height_fully() {
        let a = Cell::new(0, 0, 0, Domain(0));
        let b = Cell::new(3, 2, 4, Domain(0));
        assert_eq!(planar_oriented(&a, &b), Some(7.0));
        assert!(euclidean(&a, &b).unwrap() < 7.0);
        assert_eq!(planar_oriented(&a, &Cell::new(0, 0, 0, Domain(1))), None);
    }

    #[test]
    fn weighted_estimate() {
        let aim = Cell::new(3, 0, 4, Domain(0));
        let cost = WeightedDistance::new(aim, 1.7);
        assert!((cost.estimate(&Cell::new(0, 0, 0, Domain(0))) - 8.5).abs() < 1e-9);
        assert_eq!(cost.estimate(&aim), 0.0);
        // other domains never look attractive or unattractive
        assert_eq!(cost.estimate(&Cell::new(0, 0, 0, Domain(2))), 0.0);
    }
}
