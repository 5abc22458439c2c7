//! Poll engine
//!
//! A single tokio task ticks at the configured interval. Each tick rebuilds
//! the snapshot, diffs it against the previous one and pushes the resulting
//! events down an unbounded channel, so a slow consumer never stalls the loop.
//!
//! Roots, filters and the current snapshot live together in [`WatchState`]
//! behind one mutex. A tick holds the lock for enumeration + diff, and
//! commands take the same lock, so a mutation is applied either wholly before
//! or wholly after a tick.

use crate::config::WatchConfig;
use crate::entry::WatchedEntry;
use crate::error::WatchError;
use crate::event::{Event, OpFilter};
use crate::filter::{FilterChain, FilterRule};
use crate::roots::{self, WatchRoot, WatchSet};
use crate::snapshot::{MovePairing, Snapshot};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Roots, filters and the last snapshot, mutated as a unit
#[derive(Debug, Default)]
pub struct WatchState {
    roots: WatchSet,
    filters: FilterChain,
    snapshot: Snapshot,
    pairing: MovePairing,
}

impl WatchState {
    pub fn new(filters: FilterChain, pairing: MovePairing) -> Self {
        Self {
            roots: WatchSet::new(),
            filters,
            snapshot: Snapshot::default(),
            pairing,
        }
    }

    /// Build the initial state: filters, ignore set, then every root
    pub fn from_config(config: &WatchConfig) -> Result<Self, WatchError> {
        let mut state = Self::new(config.filter_chain()?, config.move_pairing);
        if !config.ignore_paths.is_empty() {
            state.ignore(&config.ignore_paths)?;
        }
        for path in config.roots() {
            state.add(&path, config.recursive)?;
        }
        Ok(state)
    }

    /// Register a root and enumerate it into the current snapshot
    ///
    /// No events are produced for what is already there.
    pub fn add(&mut self, path: &Path, recursive: bool) -> Result<(), WatchError> {
        let path = roots::resolve(path)?;
        let root = WatchRoot { path, recursive };

        let mut scanned = Snapshot::default();
        scanned
            .scan_root(&root, &self.filters)
            .map_err(|err| match err {
                // Not fatal here: the caller asked for a bad path
                WatchError::RootUnavailable { path, source } => WatchError::NotFound { path, source },
                other => other,
            })?;

        if self.roots.insert(root.clone()) {
            debug!(
                "Watching {} ({} entries, recursive: {})",
                root.path.display(),
                scanned.len(),
                root.recursive
            );
        }
        self.snapshot.merge(scanned);
        Ok(())
    }

    /// Unregister exactly this root
    pub fn remove(&mut self, path: &Path) -> Result<(), WatchError> {
        let path = roots::absolute(path)?;
        self.roots.remove(&path)?;
        self.prune_uncovered();
        Ok(())
    }

    /// Unregister this root and every root below it
    pub fn remove_recursive(&mut self, path: &Path) -> Result<(), WatchError> {
        let path = roots::absolute(path)?;
        let removed = self.roots.remove_recursive(&path)?;
        debug!("Removed {} root(s) under {}", removed.len(), path.display());
        self.prune_uncovered();
        Ok(())
    }

    /// Add exact-path ignore rules
    ///
    /// Ignored paths and their subtrees leave the snapshot immediately, and
    /// roots at or below an ignored path are unregistered.
    pub fn ignore(&mut self, paths: &[PathBuf]) -> Result<(), WatchError> {
        let paths = paths
            .iter()
            .map(|p| roots::absolute(p))
            .collect::<Result<Vec<_>, _>>()?;

        for path in &paths {
            if let Ok(dropped) = self.roots.remove_recursive(path) {
                debug!("Ignoring {} dropped {} root(s)", path.display(), dropped.len());
            }
        }

        self.filters.add_rule(FilterRule::IgnorePaths(paths));
        let filters = &self.filters;
        self.snapshot.retain(|p| !filters.is_ignored(p));
        self.prune_uncovered();
        Ok(())
    }

    /// One poll cycle: rebuild, diff, swap
    pub fn tick(&mut self) -> Result<Vec<Event>, WatchError> {
        let current = Snapshot::build(&self.roots, &self.filters)?;
        let events = self.snapshot.diff(&current, self.pairing);
        self.snapshot = current;
        Ok(events)
    }

    pub fn watched_files(&self) -> Vec<WatchedEntry> {
        self.snapshot.to_vec()
    }

    pub fn roots(&self) -> &WatchSet {
        &self.roots
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn prune_uncovered(&mut self) {
        let roots = &self.roots;
        self.snapshot.retain(|p| roots.covers(p));
    }
}

/// Lifecycle of a [`PollEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// What the engine pushes to its consumer
#[derive(Debug)]
pub enum Signal {
    Change(Event),
    /// Root-level failure; the loop has already exited
    Fatal(WatchError),
}

/// Owned watch engine: shared state plus the tick task
pub struct PollEngine {
    state: Arc<Mutex<WatchState>>,
    status: Arc<Mutex<EngineStatus>>,
    ops: OpFilter,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PollEngine {
    pub fn new(state: WatchState, ops: OpFilter) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            ops,
            shutdown: None,
            task: None,
        }
    }

    /// Validate `config` and build the initial state (blocking I/O)
    pub fn from_config(config: &WatchConfig) -> Result<Self, WatchError> {
        config.validate()?;
        let state = WatchState::from_config(config)?;
        Ok(Self::new(state, config.op_filter()))
    }

    /// Idle → Running. Must be called within a tokio runtime.
    pub fn start(
        &mut self,
        interval: Duration,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Result<(), WatchError> {
        if interval.is_zero() {
            return Err(WatchError::InvalidInterval(0));
        }

        {
            let mut status = self.status.lock();
            if *status != EngineStatus::Idle {
                return Err(WatchError::AlreadyRunning);
            }
            *status = EngineStatus::Running;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = Poller {
            state: Arc::clone(&self.state),
            status: Arc::clone(&self.status),
            ops: self.ops.clone(),
            interval,
            signals,
        };

        info!("Starting poll engine (interval: {:?})", interval);
        self.task = Some(tokio::spawn(poller.run(shutdown_rx)));
        self.shutdown = Some(shutdown_tx);
        Ok(())
    }

    /// Running → Stopping → Stopped
    ///
    /// An in-flight tick finishes and its events are delivered; nothing is
    /// emitted afterwards.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            *self.status.lock() = EngineStatus::Stopping;
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Poll task ended abnormally: {}", e);
            }
        }
        *self.status.lock() = EngineStatus::Stopped;
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    pub async fn add(&self, path: PathBuf, recursive: bool) -> Result<(), WatchError> {
        self.with_state(move |state| state.add(&path, recursive)).await
    }

    pub async fn remove(&self, path: PathBuf) -> Result<(), WatchError> {
        self.with_state(move |state| state.remove(&path)).await
    }

    pub async fn remove_recursive(&self, path: PathBuf) -> Result<(), WatchError> {
        self.with_state(move |state| state.remove_recursive(&path)).await
    }

    pub async fn ignore(&self, paths: Vec<PathBuf>) -> Result<(), WatchError> {
        self.with_state(move |state| state.ignore(&paths)).await
    }

    pub async fn watched_files(&self) -> Result<Vec<WatchedEntry>, WatchError> {
        self.with_state(|state| Ok(state.watched_files())).await
    }

    /// Run `f` under the state lock on the blocking pool; the lock may be
    /// held by a tick that is enumerating the file system
    async fn with_state<T, F>(&self, f: F) -> Result<T, WatchError>
    where
        F: FnOnce(&mut WatchState) -> Result<T, WatchError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        task::spawn_blocking(move || {
            let mut guard = state.lock();
            f(&mut guard)
        })
        .await?
    }
}

/// The tick loop, owned by the spawned task
struct Poller {
    state: Arc<Mutex<WatchState>>,
    status: Arc<Mutex<EngineStatus>>,
    ops: OpFilter,
    interval: Duration,
    signals: mpsc::UnboundedSender<Signal>,
}

impl Poller {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut timer = time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First tick completes immediately; the snapshot is already current
        timer.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = timer.tick() => {}
            }

            let state = Arc::clone(&self.state);
            let outcome = match task::spawn_blocking(move || {
                let mut guard = state.lock();
                guard.tick()
            })
            .await
            {
                Ok(result) => result,
                // A panicked tick is fatal, same as a lost root
                Err(e) => Err(WatchError::from(e)),
            };

            match outcome {
                Ok(events) => {
                    if !events.is_empty() {
                        debug!("Tick produced {} event(s)", events.len());
                    }
                    if !self.emit(events) {
                        warn!("Event consumer went away, stopping poll loop");
                        break;
                    }
                }
                Err(err) => {
                    error!("Poll tick failed: {}", err);
                    let _ = self.signals.send(Signal::Fatal(err));
                    break;
                }
            }
        }

        *self.status.lock() = EngineStatus::Stopped;
        info!("Poll engine stopped");
    }

    /// Returns false once the receiver is gone
    fn emit(&self, events: Vec<Event>) -> bool {
        for event in events.into_iter().filter(|e| self.ops.admits(e.op)) {
            if self.signals.send(Signal::Change(event)).is_err() {
                return false;
            }
        }
        true
    }
}
