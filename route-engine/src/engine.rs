//! The engine: one entry point for starting and tracking sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::sync::Cache as MokaCache;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::error::SearchError;
use crate::events::{NoopSink, SearchEventSink};
use crate::manager::WorkManager;
use crate::navigation::BlockProvider;
use crate::planner::{
    ConfigError, ResultState, SearchConfig, SearchSession, SessionDeps, SessionHandle, SessionId, SessionRequest,
    lock,
};
use crate::records::{PathRecordCache, PathRecordStore};
use crate::tunnels::{StaticTunnels, TunnelRegistry};

/// How long the final state of a stopped session stays queryable.
const FINISHED_TTL: Duration = Duration::from_secs(10 * 60);

/// Maximum number of stopped sessions remembered.
const FINISHED_CAPACITY: u64 = 10_000;

/// Errors from building an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The builder was used outside a tokio runtime
    #[error("no tokio runtime is available to run workers on")]
    NoRuntime,

    /// No block provider was supplied
    #[error("a block provider is required")]
    MissingBlocks,
}

/// Builder for [`Engine`].
///
/// Provides a fluent API for supplying the engine's collaborators.
pub struct EngineBuilder {
    config: SearchConfig,
    blocks: Option<Arc<dyn BlockProvider>>,
    tunnels: Arc<dyn TunnelRegistry>,
    records: Option<Arc<dyn PathRecordStore>>,
    events: Arc<dyn SearchEventSink>,
}

impl EngineBuilder {
    /// Create a new builder.
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            blocks: None,
            tunnels: Arc::new(StaticTunnels::new()),
            records: None,
            events: Arc::new(NoopSink),
        }
    }

    pub fn blocks(mut self, blocks: Arc<dyn BlockProvider>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn tunnels(mut self, tunnels: Arc<dyn TunnelRegistry>) -> Self {
        self.tunnels = tunnels;
        self
    }

    /// Remember found paths in `store`. Without a store nothing is cached
    /// between sessions.
    pub fn records(mut self, store: Arc<dyn PathRecordStore>) -> Self {
        self.records = Some(store);
        self
    }

    pub fn events(mut self, events: Arc<dyn SearchEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Validates the configuration and starts the workers on the current
    /// tokio runtime.
    pub fn build(self) -> Result<Engine, EngineError> {
        self.config.validate()?;
        let blocks = self.blocks.ok_or(EngineError::MissingBlocks)?;
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let manager = WorkManager::new();
        manager.spawn_workers(&runtime, self.config.max_concurrent_searches);

        let records = self
            .records
            .map(|store| Arc::new(PathRecordCache::new(store, self.config.max_cached_cells)));

        info!(
            workers = self.config.max_concurrent_searches,
            cached = records.is_some(),
            "route engine started"
        );

        Ok(Engine {
            deps: SessionDeps {
                config: self.config,
                blocks,
                tunnels: self.tunnels,
                records,
                events: self.events,
                manager,
                runtime,
            },
            sessions: Mutex::new(HashMap::new()),
            finished: MokaCache::builder()
                .max_capacity(FINISHED_CAPACITY)
                .time_to_live(FINISHED_TTL)
                .build(),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Runs search sessions on a shared pool of workers.
pub struct Engine {
    deps: SessionDeps,
    sessions: Mutex<HashMap<SessionId, Arc<SearchSession>>>,
    /// Final states of sessions no longer tracked.
    finished: MokaCache<SessionId, ResultState>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl Engine {
    /// Create a builder.
    pub fn builder(config: SearchConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.deps.config
    }

    /// The shared path record cache, if the engine has a store.
    pub fn records(&self) -> Option<&Arc<PathRecordCache>> {
        self.deps.records.as_ref()
    }

    pub fn manager(&self) -> &Arc<WorkManager> {
        &self.deps.manager
    }

    /// Starts searching for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Shutdown`] once the engine has been shut down.
    pub fn start_session(&self, request: SessionRequest) -> Result<SessionHandle, SearchError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SearchError::Shutdown);
        }
        self.prune();

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(session = %id, origin = %request.origin, "starting session");
        let session = SearchSession::start(id, request, &self.deps);
        let handle = session.handle();
        lock(&self.sessions).insert(id, session);
        Ok(handle)
    }

    /// Cancels a session. Returns false if it was unknown or already stopped.
    pub fn cancel(&self, id: SessionId) -> bool {
        self.session(id).is_some_and(|session| session.cancel())
    }

    /// The state of a session, if the engine still remembers it.
    pub fn state(&self, id: SessionId) -> Option<ResultState> {
        if let Some(session) = self.session(id) {
            return Some(session.state());
        }
        self.finished.get(&id)
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<SearchSession>> {
        lock(&self.sessions).get(&id).cloned()
    }

    /// Sessions that have not stopped yet.
    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions)
            .values()
            .filter(|session| !session.state().is_terminal())
            .count()
    }

    /// Moves stopped sessions out of the live table.
    fn prune(&self) {
        let mut sessions = lock(&self.sessions);
        sessions.retain(|id, session| {
            let state = session.state();
            if state.is_terminal() {
                self.finished.insert(*id, state);
                false
            } else {
                true
            }
        });
    }

    /// Cancels every running session and waits for the workers to stop.
    ///
    /// Sessions started afterwards are refused.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let sessions: Vec<Arc<SearchSession>> = lock(&self.sessions).values().cloned().collect();
        let mut canceled = 0;
        for session in sessions {
            if session.cancel() {
                canceled += 1;
            }
        }
        self.deps.manager.shutdown().await;
        self.prune();
        info!(canceled, "route engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, CellBox, Domain};
    use crate::navigation::{GridWorld, Mode, WalkMode};

    fn world() -> Arc<GridWorld> {
        let region = CellBox::new(Cell::new(-8, -1, -8, Domain(0)), Cell::new(8, 3, 8, Domain(0))).unwrap();
        Arc::new(GridWorld::builder().bounds(region).floor(region, -1).build())
    }

    fn walk() -> Vec<Arc<dyn Mode>> {
        vec![Arc::new(WalkMode)]
    }

    #[test]
    fn error_display() {
        assert_eq!(EngineError::NoRuntime.to_string(), "no tokio runtime is available to run workers on");
        assert_eq!(EngineError::MissingBlocks.to_string(), "a block provider is required");
        let invalid = EngineError::from(ConfigError::Invalid {
            field: "cells_per_slice",
            reason: "zero".to_string(),
        });
        assert_eq!(invalid.to_string(), "invalid cells_per_slice: zero");
    }

    #[test]
    fn build_needs_runtime() {
        let result = EngineBuilder::new(SearchConfig::default()).blocks(world()).build();
        assert!(matches!(result, Err(EngineError::NoRuntime)));
    }

    #[tokio::test]
    async fn build_needs_blocks() {
        let result = EngineBuilder::new(SearchConfig::default()).build();
        assert!(matches!(result, Err(EngineError::MissingBlocks)));
    }

    #[tokio::test]
    async fn build_validates_config() {
        let config = SearchConfig {
            max_concurrent_searches: 0,
            ..SearchConfig::default()
        };
        let result = EngineBuilder::new(config).blocks(world()).build();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn session_ids_are_distinct() {
        let engine = Engine::builder(SearchConfig::default()).blocks(world()).build().unwrap();
        let origin = Cell::new(0, 0, 0, Domain(0));

        let first = engine
            .start_session(SessionRequest::new(origin, origin.offset(3, 0, 0), walk()))
            .unwrap();
        let second = engine
            .start_session(SessionRequest::new(origin, origin.offset(0, 0, 3), walk()))
            .unwrap();
        assert_ne!(first.id(), second.id());

        assert_eq!(first.wait().await, ResultState::Successful);
        assert_eq!(second.wait().await, ResultState::Successful);
        assert_eq!(engine.state(first.id()), Some(ResultState::Successful));

        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn refuses_sessions_after_shutdown() {
        let engine = Engine::builder(SearchConfig::default()).blocks(world()).build().unwrap();
        engine.shutdown().await;

        let origin = Cell::new(0, 0, 0, Domain(0));
        let result = engine.start_session(SessionRequest::new(origin, origin.offset(1, 0, 0), walk()));
        assert_eq!(result.unwrap_err(), SearchError::Shutdown);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stopped_sessions_stay_queryable() {
        let engine = Engine::builder(SearchConfig::default()).blocks(world()).build().unwrap();
        let origin = Cell::new(0, 0, 0, Domain(0));

        let handle = engine
            .start_session(SessionRequest::new(origin, origin.offset(2, 0, 0), walk()))
            .unwrap();
        handle.wait().await;

        // starting another session prunes the first one out of the live table
        let _other = engine
            .start_session(SessionRequest::new(origin, origin.offset(0, 0, 2), walk()))
            .unwrap();
        assert!(engine.session(handle.id()).is_none());
        assert_eq!(engine.state(handle.id()), Some(ResultState::Successful));
        assert_eq!(engine.state(SessionId(999)), None);
        assert!(!engine.cancel(handle.id()));

        engine.shutdown().await;
    }
}
