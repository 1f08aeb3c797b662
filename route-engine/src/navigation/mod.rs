//! Movement capabilities.
//!
//! A [`Mode`] turns a cell into candidate next cells with their costs,
//! consulting a [`BlockProvider`] for terrain. The search core treats modes
//! as opaque edge generators: all passability rules live here.

mod block;
mod modes;

pub use block::{BlockProvider, GridWorld, GridWorldBuilder};
pub use modes::{DIG_COST, DigMode, DoorMode, FlyMode, WalkMode};

use crate::domain::{Cell, ModeSet, ModeType};

/// A candidate move produced by a [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeOption {
    pub cell: Cell,
    /// Cost of moving from the current cell to `cell`.
    pub cost: f64,
}

impl ModeOption {
    pub fn new(cell: Cell, cost: f64) -> Self {
        Self { cell, cost }
    }
}

/// A movement capability such as walking or flying.
///
/// Implementations must only return options in the same domain as `from`,
/// with non-negative costs.
pub trait Mode: Send + Sync {
    /// The kind of movement recorded on steps taken with this mode.
    fn mode_type(&self) -> ModeType;

    /// Candidate next cells reachable from `from`.
    fn destinations(&self, from: Cell, blocks: &dyn BlockProvider) -> Vec<ModeOption>;
}

/// Collects the mode types of a list of modes.
pub fn mode_set<'a, I>(modes: I) -> ModeSet
where
    I: IntoIterator<Item = &'a std::sync::Arc<dyn Mode>>,
{
    modes.into_iter().map(|m| m.mode_type()).collect()
}
