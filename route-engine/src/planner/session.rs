//! Search sessions.
//!
//! A session owns the meta-graph for one request. It schedules the trials
//! on the current best route, and every time one of them finishes it
//! solves the graph again. That may publish a cheaper itinerary, move the
//! search on to a different route, or end the session.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::graph::{CostPolicy, ItineraryTrial, SearchGraph, SharedTrial};
use super::trial::{Goal, PathTrial, TrialContext, TrialLimits};
use super::{ResultState, SearchConfig, SearchFlags, lock};
use crate::cache::CachedBlockProvider;
use crate::domain::{Caller, Cell, Itinerary, Target, Tunnel};
use crate::error::SearchError;
use crate::events::{SearchEvent, SearchEventSink};
use crate::manager::{WorkItem, WorkManager};
use crate::navigation::{BlockProvider, Mode, mode_set};
use crate::records::PathRecordCache;
use crate::tunnels::TunnelRegistry;

/// Identifies a session within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stop flags shared by a session and its trials.
///
/// Trials poll [`should_stop`](Self::should_stop) before every expansion.
#[derive(Debug)]
pub struct SessionSignal {
    canceled: AtomicBool,
    stopped: AtomicBool,
    deadline: Option<Instant>,
    execution_nanos: AtomicU64,
}

impl SessionSignal {
    /// Create a signal that times out `timeout` from now, if given.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            canceled: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            deadline: timeout.map(|t| Instant::now() + t),
            execution_nanos: AtomicU64::new(0),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Marks the session as finished, so outstanding trials wind down.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn timed_out(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn should_stop(&self) -> bool {
        self.is_canceled() || self.is_stopped() || self.timed_out()
    }

    /// Adds time spent inside a trial slice.
    pub fn add_execution(&self, spent: Duration) {
        let nanos = u64::try_from(spent.as_nanos()).unwrap_or(u64::MAX);
        self.execution_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Total time trials of this session have spent running.
    pub fn execution_time(&self) -> Duration {
        Duration::from_nanos(self.execution_nanos.load(Ordering::Relaxed))
    }
}

/// What a caller wants found.
#[derive(Clone)]
pub struct SessionRequest {
    pub caller: Caller,
    pub origin: Cell,
    pub target: Target,
    pub modes: Vec<Arc<dyn Mode>>,
    pub flags: SearchFlags,
}

impl SessionRequest {
    pub fn new(origin: Cell, target: impl Into<Target>, modes: Vec<Arc<dyn Mode>>) -> Self {
        Self {
            caller: Caller::default(),
            origin,
            target: target.into(),
            modes,
            flags: SearchFlags::default(),
        }
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_flags(mut self, flags: SearchFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRequest")
            .field("caller", &self.caller)
            .field("origin", &self.origin)
            .field("target", &self.target)
            .field("modes", &mode_set(&self.modes))
            .field("flags", &self.flags)
            .finish()
    }
}

/// Collaborators every session is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub config: SearchConfig,
    pub blocks: Arc<dyn BlockProvider>,
    pub tunnels: Arc<dyn TunnelRegistry>,
    pub records: Option<Arc<PathRecordCache>>,
    pub events: Arc<dyn SearchEventSink>,
    pub manager: Arc<WorkManager>,
    pub runtime: Handle,
}

/// What observers of a session can see.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub state: ResultState,
    /// The cheapest itinerary found so far.
    pub best: Option<Arc<Itinerary>>,
}

struct SessionInner {
    graph: SearchGraph,
    /// Edges handed to the work manager.
    scheduled: HashSet<usize>,
    best: Option<Arc<Itinerary>>,
    state: ResultState,
}

/// What to do once the session lock is released.
#[derive(Default)]
struct Progress {
    jobs: Vec<TrialJob>,
    finished: bool,
}

/// One search request in flight.
pub struct SearchSession {
    id: SessionId,
    origin: Cell,
    signal: Arc<SessionSignal>,
    manager: Arc<WorkManager>,
    events: Arc<dyn SearchEventSink>,
    inner: Mutex<SessionInner>,
    status: watch::Sender<SessionStatus>,
    started: Instant,
}

impl SearchSession {
    /// Builds the meta-graph for `request` and starts scheduling trials.
    ///
    /// A moving target, and any moving tunnel entrances, are resolved once
    /// here. A target that cannot be resolved leaves the session failed.
    pub fn start(id: SessionId, request: SessionRequest, deps: &SessionDeps) -> Arc<Self> {
        let SessionRequest {
            caller,
            origin,
            target,
            modes,
            flags,
        } = request;

        let timeout = flags.effective_timeout(&deps.config);
        let signal = Arc::new(SessionSignal::new(timeout));
        let blocks: Arc<dyn BlockProvider> =
            Arc::new(CachedBlockProvider::new(deps.blocks.clone(), &deps.config.block_cache()));
        let modes = flags.filter_modes(modes);

        let mut ctx = TrialContext::new(id, blocks, signal.clone())
            .with_limits(TrialLimits::from_config(&deps.config))
            .with_events(deps.events.clone())
            .with_animation(flags.animation_delay)
            .with_cache(flags.use_cache);
        if let Some(records) = &deps.records {
            ctx = ctx.with_records(records.clone());
        }
        let ctx = Arc::new(ctx);

        let moving = target.is_moving();
        let graph = match target.snapshot() {
            Some(target) => {
                let tunnels: Vec<Tunnel> = deps
                    .tunnels
                    .tunnels(&caller)
                    .iter()
                    .filter_map(Tunnel::snapshot)
                    .collect();
                SearchGraph::build(origin, &target, tunnels, &caller, |start, goal, into_destination| {
                    let goal = Goal::new(goal.clone(), &start)?;
                    let trial = PathTrial::new(start, goal, modes.clone(), ctx.clone());
                    // a snapshot of a moving target is not worth remembering
                    Some(trial.with_save_on_complete(!(into_destination && moving)))
                })
            }
            None => {
                debug!(session = %id, %origin, "target could not be resolved");
                SearchGraph::default()
            }
        };
        debug!(
            session = %id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "search graph built"
        );

        let (status, _) = watch::channel(SessionStatus {
            state: ResultState::Running,
            best: None,
        });
        let session = Arc::new(Self {
            id,
            origin,
            signal,
            manager: deps.manager.clone(),
            events: deps.events.clone(),
            inner: Mutex::new(SessionInner {
                graph,
                scheduled: HashSet::new(),
                best: None,
                state: ResultState::Running,
            }),
            status,
            started: Instant::now(),
        });

        session.events.notify(SearchEvent::SessionStarted { session: id, origin });

        if let Some(timeout) = timeout {
            let weak = Arc::downgrade(&session);
            deps.runtime.spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(session) = weak.upgrade() {
                    session.on_timeout();
                }
            });
        }

        session.drive();
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn origin(&self) -> Cell {
        self.origin
    }

    pub fn state(&self) -> ResultState {
        lock(&self.inner).state
    }

    /// The cheapest itinerary found so far.
    pub fn best(&self) -> Option<Arc<Itinerary>> {
        lock(&self.inner).best.clone()
    }

    /// Number of trials in the meta-graph.
    pub fn trial_count(&self) -> usize {
        lock(&self.inner).graph.edge_count()
    }

    /// Time this session's trials have spent running slices.
    pub fn execution_time(&self) -> Duration {
        self.signal.execution_time()
    }

    /// Wall-clock time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn handle(self: &Arc<Self>) -> SessionHandle {
        SessionHandle {
            session: Arc::clone(self),
            status: self.status.subscribe(),
        }
    }

    /// Stops the session. Returns false if it had already stopped.
    pub fn cancel(&self) -> bool {
        self.signal.cancel();
        let finished = {
            let mut inner = lock(&self.inner);
            self.finish(&mut inner, ResultState::Canceled)
        };
        if finished {
            self.manager.cancel(self.id);
        }
        finished
    }

    /// Accepts the current best itinerary and stops looking for a cheaper
    /// one.
    ///
    /// Returns `None` if nothing has been found yet; the session then keeps
    /// running. Canceled sessions have nothing to commit to.
    pub fn commit(&self) -> Option<Arc<Itinerary>> {
        let (best, finished) = {
            let mut inner = lock(&self.inner);
            if inner.state == ResultState::Canceled {
                return None;
            }
            let best = inner.best.clone()?;
            (best, self.finish(&mut inner, ResultState::Successful))
        };
        if finished {
            info!(session = %self.id, cost = best.cost(), "itinerary committed");
            self.manager.cancel(self.id);
        }
        Some(best)
    }

    fn on_trial_finished(self: &Arc<Self>, edge: usize) {
        debug!(session = %self.id, edge, "trial resolved");
        self.drive();
    }

    fn on_timeout(&self) {
        let finished = {
            let mut inner = lock(&self.inner);
            let state = if inner.best.is_some() {
                ResultState::Successful
            } else {
                ResultState::Failed
            };
            self.finish(&mut inner, state)
        };
        if finished {
            debug!(session = %self.id, "session timed out");
            self.manager.cancel(self.id);
        }
    }

    /// Solves the graph and acts on the result outside the session lock.
    fn drive(self: &Arc<Self>) {
        let progress = {
            let mut inner = lock(&self.inner);
            self.advance(&mut inner)
        };
        if progress.finished {
            self.manager.cancel(self.id);
        }
        for job in progress.jobs {
            self.manager.schedule(Box::new(job));
        }
    }

    fn advance(self: &Arc<Self>, inner: &mut SessionInner) -> Progress {
        if inner.state.is_terminal() {
            return Progress::default();
        }
        if self.signal.is_canceled() {
            return self.conclude(inner, ResultState::Canceled);
        }
        if self.signal.timed_out() {
            let state = if inner.best.is_some() {
                ResultState::Successful
            } else {
                ResultState::Failed
            };
            return self.conclude(inner, state);
        }

        if let Some(route) = inner.graph.best_route(CostPolicy::SuccessfulOnly) {
            self.offer(inner, &route);
        }

        let Some(route) = inner.graph.best_route(CostPolicy::Usable) else {
            let state = if inner.best.is_some() {
                ResultState::Successful
            } else if inner.graph.any_errored() {
                ResultState::Error
            } else {
                ResultState::Failed
            };
            return self.conclude(inner, state);
        };

        let best_cost = inner.best.as_ref().map(|best| best.cost());
        if route.is_complete() || best_cost.is_some_and(|cost| route.cost() >= cost) {
            // nothing left that could beat what we have
            let state = if inner.best.is_some() {
                ResultState::Successful
            } else {
                ResultState::Error
            };
            return self.conclude(inner, state);
        }

        let mut jobs = Vec::new();
        for edge in route.unresolved_edges() {
            if !inner.scheduled.insert(edge) {
                continue;
            }
            if let Some(trial) = inner.graph.trial(edge) {
                jobs.push(TrialJob {
                    owner: self.id,
                    session: Arc::downgrade(self),
                    edge,
                    trial: trial.clone(),
                });
            }
        }
        Progress { jobs, finished: false }
    }

    fn conclude(&self, inner: &mut SessionInner, state: ResultState) -> Progress {
        Progress {
            jobs: Vec::new(),
            finished: self.finish(inner, state),
        }
    }

    /// Publishes `route` if it beats the best itinerary so far.
    fn offer(&self, inner: &mut SessionInner, route: &ItineraryTrial) {
        if inner.best.as_ref().is_some_and(|best| route.cost() >= best.cost()) {
            return;
        }
        match inner.graph.to_itinerary(route) {
            Ok(itinerary) => {
                let tunnels = itinerary.tunnel_count();
                let cost = itinerary.cost();
                info!(session = %self.id, cost, tunnels, "found itinerary");
                inner.best = Some(Arc::new(itinerary));
                self.publish(inner);
                self.events.notify(SearchEvent::FoundSolution {
                    session: self.id,
                    cost,
                    tunnels,
                });
            }
            Err(e) => warn!(session = %self.id, error = %e, "route did not form an itinerary"),
        }
    }

    /// Moves to a terminal state. Returns false if already terminal.
    fn finish(&self, inner: &mut SessionInner, state: ResultState) -> bool {
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = state;
        self.signal.stop();
        self.publish(inner);

        let elapsed = self.started.elapsed();
        debug!(
            session = %self.id,
            %state,
            elapsed_ms = elapsed.as_millis() as u64,
            execution_ms = self.signal.execution_time().as_millis() as u64,
            "session stopped"
        );
        self.events.notify(SearchEvent::SessionStopped {
            session: self.id,
            state,
            elapsed,
        });
        true
    }

    fn publish(&self, inner: &SessionInner) {
        self.status.send_replace(SessionStatus {
            state: inner.state,
            best: inner.best.clone(),
        });
    }
}

/// A trial handed to the work manager on behalf of a session.
struct TrialJob {
    owner: SessionId,
    session: Weak<SearchSession>,
    edge: usize,
    trial: SharedTrial,
}

impl TrialJob {
    fn resolved(&self) {
        if let Some(session) = self.session.upgrade() {
            session.on_trial_finished(self.edge);
        }
    }
}

impl WorkItem for TrialJob {
    fn owner(&self) -> SessionId {
        self.owner
    }

    fn run(&mut self) -> bool {
        if self.session.strong_count() == 0 {
            lock(&self.trial).cancel();
            return true;
        }
        // the trial lock must be released before the session re-solves
        let done = lock(&self.trial).run();
        if done {
            self.resolved();
        }
        done
    }

    fn cancel(&mut self) {
        lock(&self.trial).cancel();
        self.resolved();
    }

    fn throttle(&self) -> Option<Duration> {
        lock(&self.trial).throttle()
    }
}

/// The caller's view of a session.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<SearchSession>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn state(&self) -> ResultState {
        self.session.state()
    }

    pub fn best(&self) -> Option<Arc<Itinerary>> {
        self.session.best()
    }

    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }

    pub fn commit(&self) -> Option<Arc<Itinerary>> {
        self.session.commit()
    }

    pub fn execution_time(&self) -> Duration {
        self.session.execution_time()
    }

    pub fn session(&self) -> &Arc<SearchSession> {
        &self.session
    }

    /// A receiver that sees every published status.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Waits for the session to stop.
    pub async fn wait(&self) -> ResultState {
        let mut status = self.status.clone();
        match status.wait_for(|s| s.state.is_terminal()).await {
            Ok(status) => status.state,
            Err(_) => self.session.state(),
        }
    }

    /// Waits for the first itinerary, or for the session to stop without
    /// one.
    pub async fn first_solution(&self) -> Option<Arc<Itinerary>> {
        let mut status = self.status.clone();
        match status.wait_for(|s| s.best.is_some() || s.state.is_terminal()).await {
            Ok(status) => status.best.clone(),
            Err(_) => self.session.best(),
        }
    }

    /// Waits for the session to stop and returns its itinerary.
    ///
    /// # Errors
    ///
    /// Returns why the session ended without one.
    pub async fn itinerary(&self) -> Result<Arc<Itinerary>, SearchError> {
        let state = self.wait().await;
        if let Some(best) = self.best().filter(|_| state == ResultState::Successful) {
            return Ok(best);
        }
        Err(match state {
            ResultState::Canceled => SearchError::Canceled,
            ResultState::Error => SearchError::Internal(format!("session {} faulted", self.id())),
            _ => SearchError::NoPathFound,
        })
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.session.id)
            .field("state", &self.status.borrow().state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display() {
        assert_eq!(SessionId(42).to_string(), "#42");
    }

    #[test]
    fn signal_flags() {
        let signal = SessionSignal::new(None);
        assert!(!signal.should_stop());

        signal.stop();
        assert!(signal.is_stopped());
        assert!(!signal.is_canceled());
        assert!(signal.should_stop());
    }

    #[test]
    fn signal_deadline() {
        let expired = SessionSignal::new(Some(Duration::ZERO));
        assert!(expired.timed_out());
        assert!(expired.should_stop());

        let distant = SessionSignal::new(Some(Duration::from_secs(3600)));
        assert!(!distant.timed_out());
    }

    #[test]
    fn signal_accumulates_execution() {
        let signal = SessionSignal::new(None);
        signal.add_execution(Duration::from_millis(3));
        signal.add_execution(Duration::from_millis(4));
        assert_eq!(signal.execution_time(), Duration::from_millis(7));
    }
}
