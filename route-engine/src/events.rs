//! Search notifications.
//!
//! Sinks receive lifecycle events from sessions and trials. Delivery is
//! fire-and-forget: a sink must return promptly and may drop events.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::domain::Cell;
use crate::planner::{ResultState, SessionId};

/// Something that happened during a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// A session began searching
    SessionStarted { session: SessionId, origin: Cell },
    /// A session reached a terminal state
    SessionStopped {
        session: SessionId,
        state: ResultState,
        elapsed: Duration,
    },
    /// A trial expanded a cell. Only sent for animated sessions.
    Visit { session: SessionId, cell: Cell },
    /// A trial reached a terminal state
    TrialStopped {
        session: SessionId,
        origin: Cell,
        state: ResultState,
        visited: usize,
        from_cache: bool,
    },
    /// A complete itinerary cheaper than any before it
    FoundSolution {
        session: SessionId,
        cost: f64,
        tunnels: usize,
    },
}

impl SearchEvent {
    pub fn session(&self) -> SessionId {
        match self {
            SearchEvent::SessionStarted { session, .. }
            | SearchEvent::SessionStopped { session, .. }
            | SearchEvent::Visit { session, .. }
            | SearchEvent::TrialStopped { session, .. }
            | SearchEvent::FoundSolution { session, .. } => *session,
        }
    }
}

/// Receives search events.
pub trait SearchEventSink: Send + Sync {
    fn notify(&self, event: SearchEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl SearchEventSink for NoopSink {
    fn notify(&self, _event: SearchEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl SearchEventSink for TracingSink {
    fn notify(&self, event: SearchEvent) {
        match event {
            SearchEvent::SessionStarted { session, origin } => {
                info!(%session, %origin, "search started");
            }
            SearchEvent::SessionStopped {
                session,
                state,
                elapsed,
            } => {
                info!(%session, %state, elapsed_ms = elapsed.as_millis() as u64, "search stopped");
            }
            SearchEvent::Visit { session, cell } => {
                trace!(%session, %cell, "visit");
            }
            SearchEvent::TrialStopped {
                session,
                origin,
                state,
                visited,
                from_cache,
            } => {
                debug!(%session, %origin, %state, visited, from_cache, "trial stopped");
            }
            SearchEvent::FoundSolution {
                session,
                cost,
                tunnels,
            } => {
                info!(%session, cost, tunnels, "found itinerary");
            }
        }
    }
}

/// Sends events over an unbounded channel.
///
/// Sending never blocks; events sent after the receiver is dropped are
/// discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SearchEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SearchEventSink for ChannelSink {
    fn notify(&self, event: SearchEvent) {
        let _ = self.tx.send(event);
    }
}
