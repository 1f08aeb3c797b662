//! Resumable best-first search within one domain.
//!
//! A trial keeps its frontier and visited table between calls to
//! [`PathTrial::run`], so the work manager can stop it after any slice and
//! pick it up again later without losing progress.

use std::collections::{BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use super::cost::{CostFunction, WeightedDistance, planar_oriented};
use super::graph::EdgeCost;
use super::session::{SessionId, SessionSignal};
use super::{MinScored, ResultState, SearchConfig};
use crate::domain::{Cell, CellBox, ModeSet, ModeType, Path, Step, Target};
use crate::error::SearchError;
use crate::events::{NoopSink, SearchEvent, SearchEventSink};
use crate::navigation::{BlockProvider, Mode, mode_set};
use crate::records::{PathRecord, PathRecordCache};

/// Bounds on the work one trial may do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialLimits {
    /// Visited-cell ceiling.
    pub max_cells: usize,
    /// Cells expanded per slice before yielding.
    pub cells_per_slice: usize,
    /// Multiplier on the distance heuristic.
    pub heuristic_weight: f64,
}

impl TrialLimits {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_cells: config.max_cells_per_trial,
            cells_per_slice: config.cells_per_slice,
            heuristic_weight: config.heuristic_weight,
        }
    }
}

impl Default for TrialLimits {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// Dependencies shared by every trial of one session.
pub struct TrialContext {
    session: SessionId,
    blocks: Arc<dyn BlockProvider>,
    records: Option<Arc<PathRecordCache>>,
    events: Arc<dyn SearchEventSink>,
    signal: Arc<SessionSignal>,
    limits: TrialLimits,
    animation_delay: Duration,
    use_cache: bool,
}

impl TrialContext {
    pub fn new(session: SessionId, blocks: Arc<dyn BlockProvider>, signal: Arc<SessionSignal>) -> Self {
        Self {
            session,
            blocks,
            records: None,
            events: Arc::new(NoopSink),
            signal,
            limits: TrialLimits::default(),
            animation_delay: Duration::ZERO,
            use_cache: true,
        }
    }

    pub fn with_limits(mut self, limits: TrialLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_records(mut self, records: Arc<PathRecordCache>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn SearchEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Expand at most one cell per `delay`, reporting each visit.
    pub fn with_animation(mut self, delay: Duration) -> Self {
        self.animation_delay = delay;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn signal(&self) -> &Arc<SessionSignal> {
        &self.signal
    }

    pub fn limits(&self) -> TrialLimits {
        self.limits
    }

    fn animates(&self) -> bool {
        !self.animation_delay.is_zero()
    }
}

/// What a trial is searching for.
///
/// The target decides arrival; the aim is the point the heuristic steers
/// towards, resolved once when the goal is created.
#[derive(Debug, Clone)]
pub struct Goal {
    target: Target,
    aim: Cell,
}

impl Goal {
    /// Resolves `target` as seen from `origin`.
    ///
    /// Returns `None` if the target cannot be resolved or lies in another
    /// domain.
    pub fn new(target: Target, origin: &Cell) -> Option<Self> {
        let aim = target.get(origin)?;
        (aim.domain == origin.domain).then_some(Self { target, aim })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn aim(&self) -> Cell {
        self.aim
    }

    pub fn is_satisfied_by(&self, cell: &Cell) -> bool {
        self.target.is_satisfied_by(cell)
    }

    /// The destination cell, if the goal is a single fixed cell.
    pub fn fixed_cell(&self) -> Option<Cell> {
        self.target.fixed_cell()
    }
}

/// A visited cell and the best known way of reaching it.
#[derive(Debug, Clone, Copy)]
struct Node {
    cell: Cell,
    /// Cost of the move from `previous`.
    cost: f64,
    mode: ModeType,
    previous: Option<usize>,
    /// Best known cost from the origin.
    score: f64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    node: usize,
    score: f64,
}

/// Search state kept between slices.
#[derive(Debug, Default)]
struct Frontier {
    nodes: Vec<Node>,
    index: HashMap<Cell, usize>,
    open: BinaryHeap<MinScored<Entry>>,
}

impl Frontier {
    fn seed(&mut self, origin: Cell, estimate: f64) {
        self.nodes.push(Node {
            cell: origin,
            cost: 0.0,
            mode: ModeType::None,
            previous: None,
            score: 0.0,
        });
        self.index.insert(origin, 0);
        self.open.push(MinScored::new(estimate, Entry { node: 0, score: 0.0 }));
    }

    /// Records a move to `cell` if it beats what is known. Reopens the cell
    /// when a cheaper route to an already visited cell turns up.
    fn relax(&mut self, from: usize, cell: Cell, cost: f64, mode: ModeType, estimate: f64) {
        let score = self.nodes[from].score + cost;
        let node = match self.index.get(&cell) {
            Some(&existing) => {
                let known = &mut self.nodes[existing];
                if score >= known.score {
                    return;
                }
                known.cost = cost;
                known.mode = mode;
                known.previous = Some(from);
                known.score = score;
                existing
            }
            None => {
                let id = self.nodes.len();
                self.nodes.push(Node {
                    cell,
                    cost,
                    mode,
                    previous: Some(from),
                    score,
                });
                self.index.insert(cell, id);
                id
            }
        };
        self.open.push(MinScored::new(score + estimate, Entry { node, score }));
    }

    fn steps_to(&self, node: usize) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let node = &self.nodes[id];
            steps.push(match node.previous {
                Some(_) => Step::new(node.cell, node.cost, node.mode),
                None => Step::start(node.cell),
            });
            current = node.previous;
        }
        steps.reverse();
        steps
    }
}

/// A resumable search from an origin cell to a goal.
pub struct PathTrial {
    origin: Cell,
    goal: Goal,
    modes: Vec<Arc<dyn Mode>>,
    mode_set: ModeSet,
    heuristic: WeightedDistance,
    ctx: Arc<TrialContext>,
    save_on_complete: bool,
    state: ResultState,
    path: Option<Path>,
    error: Option<SearchError>,
    from_cache: bool,
    frontier: Frontier,
    expansions: usize,
    visited: usize,
    started_at: Option<Instant>,
    elapsed: Duration,
    last_expansion: Option<Instant>,
}

impl PathTrial {
    pub fn new(origin: Cell, goal: Goal, modes: Vec<Arc<dyn Mode>>, ctx: Arc<TrialContext>) -> Self {
        let heuristic = WeightedDistance::new(goal.aim(), ctx.limits.heuristic_weight);
        Self {
            origin,
            mode_set: mode_set(&modes),
            goal,
            modes,
            heuristic,
            ctx,
            save_on_complete: false,
            state: ResultState::Idle,
            path: None,
            error: None,
            from_cache: false,
            frontier: Frontier::default(),
            expansions: 0,
            visited: 0,
            started_at: None,
            elapsed: Duration::ZERO,
            last_expansion: None,
        }
    }

    /// Report a found path to the record store.
    pub fn with_save_on_complete(mut self, save: bool) -> Self {
        self.save_on_complete = save;
        self
    }

    pub fn origin(&self) -> Cell {
        self.origin
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn state(&self) -> ResultState {
        self.state
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// Why the trial failed, if it did not succeed.
    pub fn error(&self) -> Option<&SearchError> {
        self.error.as_ref()
    }

    /// Returns true if the result was taken from the record store.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn mode_set(&self) -> ModeSet {
        self.mode_set
    }

    /// Cells whose neighbors have been generated.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    /// Cells discovered so far, or by the finished search.
    pub fn visited(&self) -> usize {
        self.visited.max(self.frontier.nodes.len())
    }

    /// Time spent inside slices.
    pub fn execution_time(&self) -> Duration {
        self.elapsed
    }

    /// What this trial is expected to cost as an edge of the meta-graph.
    pub fn cost_estimate(&self) -> EdgeCost {
        match self.state {
            ResultState::Successful => self
                .path
                .as_ref()
                .map_or(EdgeCost::Unusable, |path| EdgeCost::Known(path.cost())),
            ResultState::Idle | ResultState::Running => {
                EdgeCost::Approximate(planar_oriented(&self.origin, &self.goal.aim()).unwrap_or(0.0))
            }
            ResultState::Failed | ResultState::Canceled | ResultState::Error => EdgeCost::Unusable,
        }
    }

    /// How long to wait before the next slice can make progress.
    pub fn throttle(&self) -> Option<Duration> {
        if self.state.is_terminal() || !self.ctx.animates() || self.ctx.signal.should_stop() {
            return None;
        }
        let since = self.last_expansion?.elapsed();
        self.ctx.animation_delay.checked_sub(since).filter(|d| !d.is_zero())
    }

    /// Runs one bounded slice. Returns true once the trial is terminal.
    ///
    /// Faults raised by modes or the block provider end the trial in
    /// [`ResultState::Error`] instead of unwinding into the caller.
    pub fn run(&mut self) -> bool {
        if self.state.is_terminal() {
            return true;
        }

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_slice()));
        let spent = started.elapsed();
        self.elapsed += spent;
        self.ctx.signal.add_execution(spent);

        match outcome {
            Ok(done) => done,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown fault".to_string());
                error!(
                    session = %self.ctx.session,
                    origin = %self.origin,
                    %message,
                    "path trial faulted"
                );
                self.finish(ResultState::Error, Some(SearchError::Internal(message)));
                true
            }
        }
    }

    /// Stops the trial if it is still running.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.finish(ResultState::Canceled, Some(SearchError::Canceled));
        }
    }

    /// Discards any result so the next run searches again.
    pub fn reset(&mut self) {
        self.state = ResultState::Idle;
        self.path = None;
        self.error = None;
        self.from_cache = false;
        self.frontier = Frontier::default();
        self.expansions = 0;
        self.visited = 0;
        self.started_at = None;
        self.last_expansion = None;
    }

    fn run_slice(&mut self) -> bool {
        if self.state == ResultState::Idle {
            self.state = ResultState::Running;
            self.started_at = Some(Instant::now());
            if self.seed_from_cache() {
                return true;
            }
            if let Ok(region) = CellBox::new(self.origin, self.goal.aim()) {
                self.ctx.blocks.prefetch(&region);
            }
            self.frontier.seed(self.origin, self.heuristic.estimate(&self.origin));
        }

        let limits = self.ctx.limits;
        let animate = self.ctx.animates();
        let mut processed = 0;

        loop {
            if self.ctx.signal.should_stop() {
                self.finish(ResultState::Canceled, Some(SearchError::Canceled));
                return true;
            }
            if animate && self.throttle().is_some() {
                return false;
            }
            if self.frontier.nodes.len() > limits.max_cells {
                self.finish(
                    ResultState::Failed,
                    Some(SearchError::ResourceExceeded {
                        limit: limits.max_cells,
                    }),
                );
                return true;
            }
            if processed >= limits.cells_per_slice {
                return false;
            }

            let Some(MinScored { item: entry, .. }) = self.frontier.open.pop() else {
                self.finish(ResultState::Failed, Some(SearchError::NoPathFound));
                return true;
            };
            let node = self.frontier.nodes[entry.node];
            if entry.score > node.score {
                // superseded by a cheaper route
                continue;
            }
            processed += 1;

            if self.goal.is_satisfied_by(&node.cell) {
                self.complete(entry.node);
                return true;
            }

            self.expand(entry.node, node.cell);
            if animate {
                self.last_expansion = Some(Instant::now());
                self.ctx.events.notify(SearchEvent::Visit {
                    session: self.ctx.session,
                    cell: node.cell,
                });
            }
        }
    }

    fn expand(&mut self, id: usize, cell: Cell) {
        self.expansions += 1;
        for mode in &self.modes {
            let mode_type = mode.mode_type();
            for option in mode.destinations(cell, self.ctx.blocks.as_ref()) {
                // modes must stay in the domain and never pay negative costs
                if option.cell.domain != cell.domain || !(option.cost >= 0.0) {
                    continue;
                }
                let estimate = self.heuristic.estimate(&option.cell);
                self.frontier.relax(id, option.cell, option.cost, mode_type, estimate);
            }
        }
    }

    fn complete(&mut self, node: usize) {
        let path = match Path::from_steps(self.frontier.steps_to(node)) {
            Ok(path) => path,
            Err(e) => {
                self.finish(ResultState::Error, Some(SearchError::Internal(e.to_string())));
                return;
            }
        };

        if self.save_on_complete && self.ctx.use_cache && path.len() > 1 && self.goal.fixed_cell().is_some() {
            if let Some(records) = &self.ctx.records {
                let duration = self.started_at.map_or(Duration::ZERO, |t| t.elapsed());
                match PathRecord::new(path.clone(), duration) {
                    Ok(record) => {
                        records.save(record);
                    }
                    Err(e) => debug!(origin = %self.origin, error = %e, "path not recorded"),
                }
            }
        }

        self.path = Some(path);
        self.finish(ResultState::Successful, None);
    }

    /// Takes the result from the record store if a usable path is there.
    fn seed_from_cache(&mut self) -> bool {
        if !self.ctx.use_cache {
            return false;
        }
        let (Some(records), Some(destination)) = (self.ctx.records.clone(), self.goal.fixed_cell()) else {
            return false;
        };
        let Some(record) = records.lookup(&self.origin, &destination, &self.mode_set) else {
            return false;
        };
        if let Err(e) = self.check_record(&record, destination) {
            debug!(session = %self.ctx.session, origin = %self.origin, error = %e, "ignoring cached path");
            return false;
        }

        trace!(origin = %self.origin, %destination, "path taken from cache");
        self.path = Some(record.path().clone());
        self.from_cache = true;
        self.finish(ResultState::Successful, None);
        true
    }

    fn check_record(&self, record: &PathRecord, destination: Cell) -> Result<(), SearchError> {
        if record.origin() != self.origin || record.destination() != destination {
            return Err(SearchError::CacheInconsistency(format!(
                "record runs from {} to {}",
                record.origin(),
                record.destination()
            )));
        }
        if !record.path().achievable_with(&self.mode_set) {
            return Err(SearchError::CacheInconsistency(format!(
                "record needs {} but only {} are available",
                record.path().mode_types(),
                self.mode_set
            )));
        }
        Ok(())
    }

    fn finish(&mut self, state: ResultState, error: Option<SearchError>) {
        self.state = state;
        self.error = error;
        self.visited = self.visited.max(self.frontier.nodes.len());
        self.frontier = Frontier::default();

        debug!(
            session = %self.ctx.session,
            origin = %self.origin,
            aim = %self.goal.aim(),
            %state,
            visited = self.visited,
            from_cache = self.from_cache,
            "path trial stopped"
        );
        self.ctx.events.notify(SearchEvent::TrialStopped {
            session: self.ctx.session,
            origin: self.origin,
            state,
            visited: self.visited,
            from_cache: self.from_cache,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Domain;
    use crate::navigation::{FlyMode, GridWorld, ModeOption, WalkMode};
    use crate::records::{MemoryPathRecordStore, PathRecordStore};

    const D: Domain = Domain(0);

    fn flat_world() -> Arc<GridWorld> {
        let region = CellBox::new(Cell::new(-10, -1, -10, D), Cell::new(10, 4, 10, D)).unwrap();
        Arc::new(GridWorld::builder().bounds(region).floor(region, -1).build())
    }

    fn limits(max_cells: usize) -> TrialLimits {
        TrialLimits {
            max_cells,
            cells_per_slice: 1_000,
            heuristic_weight: 1.0,
        }
    }

    fn context(blocks: Arc<dyn BlockProvider>) -> TrialContext {
        TrialContext::new(SessionId(1), blocks, Arc::new(SessionSignal::new(None))).with_limits(limits(10_000))
    }

    fn walk() -> Vec<Arc<dyn Mode>> {
        vec![Arc::new(WalkMode)]
    }

    fn trial(ctx: TrialContext, origin: Cell, destination: Cell) -> PathTrial {
        let goal = Goal::new(destination.into(), &origin).unwrap();
        PathTrial::new(origin, goal, walk(), Arc::new(ctx))
    }

    fn run_to_end(trial: &mut PathTrial) {
        for _ in 0..1_000 {
            if trial.run() {
                return;
            }
        }
        panic!("trial did not finish");
    }

    #[test]
    fn walks_octile_distance_on_flat_ground() {
        let origin = Cell::new(0, 0, 0, D);
        let destination = Cell::new(5, 0, 3, D);
        let mut trial = trial(context(flat_world()), origin, destination);

        run_to_end(&mut trial);

        assert_eq!(trial.state(), ResultState::Successful);
        let path = trial.path().unwrap();
        assert_eq!(path.origin(), origin);
        assert_eq!(path.destination(), destination);
        let expected = 3.0 * 2f64.sqrt() + 2.0;
        assert!((path.cost() - expected).abs() < 1e-9, "cost {}", path.cost());
        assert!(!trial.from_cache());
        assert!(trial.error().is_none());
    }

    #[test]
    fn origin_already_at_goal() {
        let origin = Cell::new(2, 0, 2, D);
        let mut trial = trial(context(flat_world()), origin, origin);

        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Successful);
        assert_eq!(trial.path().unwrap().len(), 1);
        assert_eq!(trial.expansions(), 0);
    }

    #[test]
    fn region_goal_stops_at_first_cell_inside() {
        let origin = Cell::new(0, 0, 0, D);
        let region = CellBox::new(Cell::new(4, 0, -2, D), Cell::new(6, 0, 2, D)).unwrap();
        let goal = Goal::new(region.into(), &origin).unwrap();
        let mut trial = PathTrial::new(origin, goal, walk(), Arc::new(context(flat_world())));

        run_to_end(&mut trial);

        let path = trial.path().unwrap();
        assert_eq!(path.destination(), Cell::new(4, 0, 0, D));
        assert!((path.cost() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn ceiling_of_one_fails_first_slice() {
        let origin = Cell::new(0, 0, 0, D);
        let unreachable = Cell::new(0, 0, 50, D);
        let ctx = context(flat_world()).with_limits(limits(1));
        let mut trial = trial(ctx, origin, unreachable);

        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Failed);
        assert_eq!(trial.error(), Some(&SearchError::ResourceExceeded { limit: 1 }));
        assert_eq!(trial.cost_estimate(), EdgeCost::Unusable);
    }

    #[test]
    fn exhausted_frontier_fails() {
        let region = CellBox::new(Cell::new(0, -1, 0, D), Cell::new(2, 2, 2, D)).unwrap();
        let world = Arc::new(GridWorld::builder().bounds(region).floor(region, -1).build());
        let mut trial = trial(context(world), Cell::new(0, 0, 0, D), Cell::new(8, 0, 8, D));

        run_to_end(&mut trial);

        assert_eq!(trial.state(), ResultState::Failed);
        assert_eq!(trial.error(), Some(&SearchError::NoPathFound));
        assert_eq!(trial.visited(), 9);
    }

    #[test]
    fn yields_after_slice_quota() {
        let ctx = context(flat_world()).with_limits(TrialLimits {
            max_cells: 10_000,
            cells_per_slice: 2,
            heuristic_weight: 1.0,
        });
        let mut trial = trial(ctx, Cell::new(-8, 0, -8, D), Cell::new(8, 0, 8, D));

        assert!(!trial.run());
        assert_eq!(trial.state(), ResultState::Running);
        assert_eq!(trial.expansions(), 2);
        assert!(matches!(trial.cost_estimate(), EdgeCost::Approximate(_)));

        run_to_end(&mut trial);
        assert_eq!(trial.state(), ResultState::Successful);
    }

    #[test]
    fn rerunning_terminal_trial_is_idempotent() {
        let mut trial = trial(context(flat_world()), Cell::new(0, 0, 0, D), Cell::new(3, 0, 0, D));
        run_to_end(&mut trial);
        let cost = trial.path().unwrap().cost();
        let expansions = trial.expansions();

        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Successful);
        assert_eq!(trial.path().unwrap().cost(), cost);
        assert_eq!(trial.expansions(), expansions);
    }

    #[test]
    fn reset_searches_again() {
        let mut trial = trial(context(flat_world()), Cell::new(0, 0, 0, D), Cell::new(3, 0, 0, D));
        run_to_end(&mut trial);
        trial.reset();

        assert_eq!(trial.state(), ResultState::Idle);
        assert!(trial.path().is_none());
        run_to_end(&mut trial);
        assert_eq!(trial.state(), ResultState::Successful);
    }

    #[test]
    fn stop_signal_cancels() {
        let signal = Arc::new(SessionSignal::new(None));
        let ctx = TrialContext::new(SessionId(1), flat_world(), signal.clone());
        let mut trial = trial(ctx, Cell::new(0, 0, 0, D), Cell::new(5, 0, 0, D));

        signal.cancel();
        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Canceled);
        assert_eq!(trial.error(), Some(&SearchError::Canceled));
    }

    #[test]
    fn cache_hit_skips_search() {
        let origin = Cell::new(0, 0, 0, D);
        let destination = Cell::new(3, 0, 0, D);
        let steps = vec![
            Step::start(origin),
            Step::new(origin.offset(1, 0, 0), 1.0, ModeType::Walk),
            Step::new(origin.offset(2, 0, 0), 1.0, ModeType::Walk),
            Step::new(destination, 1.0, ModeType::Walk),
        ];
        let record = PathRecord::new(Path::from_steps(steps).unwrap(), Duration::from_millis(3)).unwrap();
        let store = Arc::new(MemoryPathRecordStore::with_records([record]));
        let records = Arc::new(PathRecordCache::new(store, 1_000));

        let ctx = context(flat_world()).with_records(records);
        let goal = Goal::new(destination.into(), &origin).unwrap();
        let modes: Vec<Arc<dyn Mode>> = vec![Arc::new(WalkMode), Arc::new(FlyMode)];
        let mut trial = PathTrial::new(origin, goal, modes, Arc::new(ctx));

        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Successful);
        assert!(trial.from_cache());
        assert_eq!(trial.expansions(), 0);
        assert_eq!(trial.cost_estimate(), EdgeCost::Known(3.0));
    }

    #[test]
    fn cache_ignored_when_disabled() {
        let origin = Cell::new(0, 0, 0, D);
        let destination = Cell::new(1, 0, 0, D);
        let path = Path::from_steps(vec![Step::start(origin), Step::new(destination, 0.5, ModeType::Walk)]).unwrap();
        let store = Arc::new(MemoryPathRecordStore::with_records([PathRecord::new(path, Duration::ZERO).unwrap()]));
        let records = Arc::new(PathRecordCache::new(store, 1_000));

        let ctx = context(flat_world()).with_records(records).with_cache(false);
        let mut trial = trial(ctx, origin, destination);
        run_to_end(&mut trial);

        assert!(!trial.from_cache());
        assert_eq!(trial.path().unwrap().cost(), 1.0);
    }

    /// Hands back whatever record it was built with, matching or not.
    struct StaleStore(PathRecord);

    impl PathRecordStore for StaleStore {
        fn get(&self, _: &Cell, _: &Cell, _: &ModeSet) -> Option<PathRecord> {
            Some(self.0.clone())
        }
        fn put(&self, _: PathRecord) -> Result<bool, crate::records::RecordError> {
            Ok(false)
        }
        fn total_cached_cells(&self) -> usize {
            self.0.cell_count()
        }
        fn len(&self) -> usize {
            1
        }
        fn truncate(&self) -> Result<(), crate::records::RecordError> {
            Ok(())
        }
    }

    #[test]
    fn inconsistent_cache_entry_is_a_miss() {
        let origin = Cell::new(0, 0, 0, D);
        let destination = Cell::new(2, 0, 0, D);
        let flown = Path::from_steps(vec![
            Step::start(origin),
            Step::new(origin.offset(1, 0, 0), 1.0, ModeType::Fly),
            Step::new(destination, 1.0, ModeType::Fly),
        ])
        .unwrap();
        let store = Arc::new(StaleStore(PathRecord::new(flown, Duration::ZERO).unwrap()));
        let ctx = context(flat_world()).with_records(Arc::new(PathRecordCache::new(store, 1_000)));
        let mut trial = trial(ctx, origin, destination);

        run_to_end(&mut trial);

        assert_eq!(trial.state(), ResultState::Successful);
        assert!(!trial.from_cache());
        assert!(trial.path().unwrap().achievable_with(&ModeSet::from_iter([ModeType::Walk])));
    }

    #[test]
    fn successful_search_is_recorded() {
        let store = Arc::new(MemoryPathRecordStore::new());
        let records = Arc::new(PathRecordCache::new(store.clone(), 1_000));
        let origin = Cell::new(0, 0, 0, D);
        let destination = Cell::new(4, 0, 0, D);

        let ctx = context(flat_world()).with_records(records);
        let mut trial = trial(ctx, origin, destination).with_save_on_complete(true);
        run_to_end(&mut trial);

        let walk = ModeSet::from_iter([ModeType::Walk]);
        let record = store.get(&origin, &destination, &walk).unwrap();
        assert_eq!(record.cost(), 4.0);
    }

    /// A mode that faults at a chosen cell.
    struct Tripwire(Cell);

    impl Mode for Tripwire {
        fn mode_type(&self) -> ModeType {
            ModeType::Walk
        }

        fn destinations(&self, from: Cell, blocks: &dyn BlockProvider) -> Vec<ModeOption> {
            if from == self.0 {
                panic!("tripwire at {from}");
            }
            WalkMode.destinations(from, blocks)
        }
    }

    #[test]
    fn fault_becomes_error() {
        let origin = Cell::new(0, 0, 0, D);
        let goal = Goal::new(Cell::new(5, 0, 0, D).into(), &origin).unwrap();
        let modes: Vec<Arc<dyn Mode>> = vec![Arc::new(Tripwire(origin))];
        let mut trial = PathTrial::new(origin, goal, modes, Arc::new(context(flat_world())));

        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Error);
        assert!(matches!(trial.error(), Some(SearchError::Internal(m)) if m.contains("tripwire")));
        assert_eq!(trial.cost_estimate(), EdgeCost::Unusable);
    }

    #[test]
    fn animation_expands_one_cell_per_delay() {
        let ctx = context(flat_world()).with_animation(Duration::from_secs(3600));
        let mut trial = trial(ctx, Cell::new(0, 0, 0, D), Cell::new(5, 0, 0, D));

        assert!(!trial.run());
        assert_eq!(trial.expansions(), 1);
        assert!(trial.throttle().is_some());

        assert!(!trial.run());
        assert_eq!(trial.expansions(), 1);
    }

    #[test]
    fn cancel_while_animating() {
        let signal = Arc::new(SessionSignal::new(None));
        let ctx = TrialContext::new(SessionId(1), flat_world(), signal.clone())
            .with_limits(limits(10_000))
            .with_animation(Duration::from_secs(3600));
        let mut trial = trial(ctx, Cell::new(0, 0, 0, D), Cell::new(5, 0, 0, D));

        assert!(!trial.run());
        assert!(trial.throttle().is_some());

        signal.cancel();
        assert_eq!(trial.throttle(), None);
        assert!(trial.run());
        assert_eq!(trial.state(), ResultState::Canceled);
        assert_eq!(trial.expansions(), 1);
    }

    #[test]
    fn goal_must_share_domain() {
        let origin = Cell::new(0, 0, 0, D);
        assert!(Goal::new(Cell::new(0, 0, 0, Domain(1)).into(), &origin).is_none());
        assert!(Goal::new(Target::moving(D, || None), &origin).is_none());
    }
}
