//! Cooperative scheduling of trial slices.
//!
//! Work items are queued per owning session. Workers take from the owners
//! in rotation, so a session with many pending trials gets no more turns
//! than a session with one. Each turn runs a single bounded slice; an item
//! that is not finished goes to the back of its owner's queue.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::planner::SessionId;

/// A unit of resumable work.
pub trait WorkItem: Send {
    /// The session this work belongs to.
    fn owner(&self) -> SessionId;

    /// Runs one bounded slice. Returns true once there is nothing left to do.
    fn run(&mut self) -> bool;

    /// Called instead of further slices when the work is abandoned.
    fn cancel(&mut self) {}

    /// How long to wait before the next slice is worth running.
    fn throttle(&self) -> Option<Duration> {
        None
    }
}

#[derive(Default)]
struct Queues {
    pending: HashMap<SessionId, VecDeque<Box<dyn WorkItem>>>,
    /// Owners with pending work, in turn order. An owner appears here
    /// exactly when its pending queue is non-empty.
    rotation: VecDeque<SessionId>,
    /// Items taken out of their queue and not yet returned.
    in_flight: HashMap<SessionId, usize>,
    /// Owners whose returning items are dropped.
    canceled: HashSet<SessionId>,
    shutdown: bool,
}

impl Queues {
    fn push(&mut self, item: Box<dyn WorkItem>) {
        let owner = item.owner();
        let queue = self.pending.entry(owner).or_default();
        if queue.is_empty() {
            self.rotation.push_back(owner);
        }
        queue.push_back(item);
    }

    fn take(&mut self) -> Option<Box<dyn WorkItem>> {
        let owner = self.rotation.pop_front()?;
        let queue = self.pending.get_mut(&owner)?;
        let item = queue.pop_front()?;
        if queue.is_empty() {
            self.pending.remove(&owner);
        } else {
            self.rotation.push_back(owner);
        }
        *self.in_flight.entry(owner).or_default() += 1;
        Some(item)
    }

    fn returned(&mut self, owner: SessionId) {
        if let Some(count) = self.in_flight.get_mut(&owner) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&owner);
                if !self.pending.contains_key(&owner) {
                    self.canceled.remove(&owner);
                }
            }
        }
    }

    fn rejects(&self, owner: SessionId) -> bool {
        self.shutdown || self.canceled.contains(&owner)
    }
}

/// Runs work items on a fixed pool of tokio tasks.
pub struct WorkManager {
    queues: Mutex<Queues>,
    notify: Notify,
    /// Wakes throttled items early when their owner is canceled.
    woken: Notify,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkManager {
    /// Create a manager with no workers.
    ///
    /// Work only runs once [`spawn_workers`](Self::spawn_workers) is called,
    /// or when driven by hand with [`step`](Self::step).
    pub fn new() -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            queues: Mutex::new(Queues::default()),
            notify: Notify::new(),
            woken: Notify::new(),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        })
    }

    fn queues(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start `count` workers on `runtime`.
    pub fn spawn_workers(self: &Arc<Self>, runtime: &Handle, count: usize) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for index in workers.len()..workers.len() + count {
            let manager = Arc::clone(self);
            let shutdown = self.shutdown_tx.subscribe();
            workers.push(runtime.spawn(manager.work(index, shutdown)));
        }
        debug!(workers = workers.len(), "work manager started");
    }

    /// Queue `item` behind its owner's other work.
    ///
    /// Items for canceled owners, or arriving after shutdown, are canceled
    /// straight away.
    pub fn schedule(&self, mut item: Box<dyn WorkItem>) {
        let owner = item.owner();
        {
            let mut queues = self.queues();
            if !queues.rejects(owner) {
                queues.push(item);
                drop(queues);
                trace!(%owner, "work scheduled");
                self.notify.notify_one();
                return;
            }
        }
        item.cancel();
    }

    /// Drop all of `owner`'s queued work, canceling each item.
    ///
    /// Items mid-slice finish their slice and are then dropped.
    pub fn cancel(&self, owner: SessionId) {
        let removed = {
            let mut queues = self.queues();
            queues.rotation.retain(|o| *o != owner);
            let removed = queues.pending.remove(&owner).unwrap_or_default();
            if queues.in_flight.contains_key(&owner) {
                queues.canceled.insert(owner);
            }
            removed
        };
        self.woken.notify_waiters();
        if !removed.is_empty() {
            debug!(%owner, items = removed.len(), "canceled queued work");
        }
        for mut item in removed {
            item.cancel();
        }
    }

    /// Queued items across all owners.
    pub fn pending(&self) -> usize {
        self.queues().pending.values().map(VecDeque::len).sum()
    }

    /// Queued items for one owner.
    pub fn pending_for(&self, owner: SessionId) -> usize {
        self.queues().pending.get(&owner).map_or(0, VecDeque::len)
    }

    /// Runs a single slice on the calling thread.
    ///
    /// Returns false if nothing was queued.
    pub fn step(&self) -> bool {
        let Some(mut item) = self.queues().take() else {
            return false;
        };
        let done = item.run();
        self.give_back(item, done);
        true
    }

    fn give_back(&self, mut item: Box<dyn WorkItem>, done: bool) {
        let owner = item.owner();
        {
            let mut queues = self.queues();
            // check before the in-flight count drops, which may forget the owner
            let rejected = queues.rejects(owner);
            queues.returned(owner);
            if done {
                return;
            }
            if !rejected {
                queues.push(item);
                drop(queues);
                self.notify.notify_one();
                return;
            }
        }
        item.cancel();
    }

    async fn work(self: Arc<Self>, index: usize, mut shutdown: watch::Receiver<bool>) {
        trace!(worker = index, "worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let next = self.queues().take();
            let mut item = match next {
                Some(item) => item,
                None => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = shutdown.changed() => {}
                    }
                    continue;
                }
            };

            let done = item.run();
            match item.throttle().filter(|_| !done) {
                Some(delay) => {
                    // keep the item counted as in flight while it waits
                    tokio::spawn(Arc::clone(&self).rest(item, delay));
                }
                None => self.give_back(item, done),
            }
            tokio::task::yield_now().await;
        }
        trace!(worker = index, "worker stopped");
    }

    /// Holds a throttled item for `delay`, or until its owner is canceled.
    async fn rest(self: Arc<Self>, item: Box<dyn WorkItem>, delay: Duration) {
        let owner = item.owner();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            let woken = self.woken.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();
            if self.queues().rejects(owner) {
                break;
            }
            tokio::select! {
                _ = &mut sleep => break,
                _ = woken => {}
            }
        }
        self.give_back(item, false);
    }

    /// Stop accepting work, cancel everything queued and wait for the
    /// workers to finish their current slices.
    pub async fn shutdown(&self) {
        let drained: Vec<Box<dyn WorkItem>> = {
            let mut queues = self.queues();
            queues.shutdown = true;
            queues.rotation.clear();
            queues.pending.drain().flat_map(|(_, items)| items).collect()
        };
        for mut item in drained {
            item.cancel();
        }

        self.shutdown_tx.send_replace(true);
        self.notify.notify_waiters();
        self.woken.notify_waiters();

        let workers: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };
        let count = workers.len();
        join_all(workers).await;
        debug!(workers = count, "work manager stopped");
    }
}
