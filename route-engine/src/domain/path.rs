//! Paths within a single domain.

use serde::{Deserialize, Serialize};

use super::{Cell, DomainError, ModeSet, ModeType};

/// One cell of a path and how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub cell: Cell,
    /// Cost of moving here from the previous step.
    pub cost: f64,
    /// Movement used to arrive here.
    pub mode: ModeType,
}

impl Step {
    pub fn new(cell: Cell, cost: f64, mode: ModeType) -> Self {
        Self { cell, cost, mode }
    }

    /// The zero-cost step a path begins with.
    pub fn start(cell: Cell) -> Self {
        Self::new(cell, 0.0, ModeType::None)
    }
}

/// An ordered sequence of steps from an origin cell.
///
/// # Invariants
///
/// - At least one step (the origin)
/// - The first step's cell is the origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    steps: Vec<Step>,
    cost: f64,
}

impl Path {
    /// Constructs a path with a precomputed total cost.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `steps` is empty.
    pub fn new(steps: Vec<Step>, cost: f64) -> Result<Self, DomainError> {
        if steps.is_empty() {
            return Err(DomainError::EmptyPath);
        }
        Ok(Self { steps, cost })
    }

    /// Constructs a path whose cost is the sum of its step costs.
    pub fn from_steps(steps: Vec<Step>) -> Result<Self, DomainError> {
        let cost = steps.iter().map(|s| s.cost).sum();
        Self::new(steps, cost)
    }

    /// A path that starts and ends at `cell` without moving.
    pub fn stationary(cell: Cell) -> Self {
        Self {
            steps: vec![Step::start(cell)],
            cost: 0.0,
        }
    }

    pub fn origin(&self) -> Cell {
        self.steps[0].cell
    }

    pub fn destination(&self) -> Cell {
        self.steps[self.steps.len() - 1].cell
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of cells in the path, origin included.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: a path holds at least its origin.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The set of movement kinds used along the path.
    pub fn mode_types(&self) -> ModeSet {
        self.steps.iter().map(|s| s.mode).collect()
    }

    /// Returns true if every step could be taken using only `modes`.
    pub fn achievable_with(&self, modes: &ModeSet) -> bool {
        self.mode_types().is_subset(modes)
    }
}
