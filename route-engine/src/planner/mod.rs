//! Route planning.
//!
//! A session answers one request: "how do I get from here to there?"
//! It builds a meta-graph whose nodes are tunnels and whose edges are
//! resumable path trials, lets the work manager run the trials in small
//! slices, and re-solves the meta-graph each time a trial finishes.

mod config;
mod cost;
mod graph;
mod session;
mod trial;


pub use config::{ConfigError, SearchConfig, SearchFlags};
pub use cost::{CostFunction, WeightedDistance, euclidean, planar_oriented};
pub use graph::{CostPolicy, EdgeCost, ItineraryTrial, NodeKind, SearchGraph, SharedTrial};
pub use session::{SearchSession, SessionDeps, SessionHandle, SessionId, SessionRequest, SessionSignal, SessionStatus};
pub use trial::{Goal, PathTrial, TrialContext, TrialLimits};

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle of trials and sessions.
///
/// Both start idle, run, and end in exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultState {
    Idle,
    Running,
    Successful,
    Failed,
    Canceled,
    Error,
}

impl ResultState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResultState::Successful | ResultState::Failed | ResultState::Canceled | ResultState::Error
        )
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultState::Idle => "idle",
            ResultState::Running => "running",
            ResultState::Successful => "successful",
            ResultState::Failed => "failed",
            ResultState::Canceled => "canceled",
            ResultState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Locks `mutex`, carrying on with the data if a holder panicked.
///
/// Trials catch their own faults, so a poisoned lock still guards a
/// consistent trial.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Heap entry ordered so that `BinaryHeap` pops the lowest score first.
#[derive(Debug, Clone, Copy)]
struct MinScored<T> {
    score: f64,
    item: T,
}

impl<T> MinScored<T> {
    fn new(score: f64, item: T) -> Self {
        Self { score, item }
    }
}

impl<T> PartialEq for MinScored<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for MinScored<T> {}

impl<T> PartialOrd for MinScored<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for MinScored<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn terminal_states() {
        assert!(!ResultState::Idle.is_terminal());
        assert!(!ResultState::Running.is_terminal());
        assert!(ResultState::Successful.is_terminal());
        assert!(ResultState::Failed.is_terminal());
        assert!(ResultState::Canceled.is_terminal());
        assert!(ResultState::Error.is_terminal());
    }

    #[test]
    fn min_scored_pops_lowest() {
        let mut heap = BinaryHeap::new();
        heap.push(MinScored::new(3.0, 'c'));
        heap.push(MinScored::new(1.0, 'a'));
        heap.push(MinScored::new(2.0, 'b'));

        let order: Vec<char> = std::iter::from_fn(|| heap.pop().map(|m| m.item)).collect();
        assert_eq!(order, vec!['a', 'b', 'c']);
    }
}
