// src/reconcile/runner.rs

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::errors::{DockshipError, Result};
use crate::exec::CommandRunner;
use crate::watch::{ArchiveEvent, WatcherHandle};

use super::cycle::{CycleOutcome, CycleState};
use super::debounce::{Quiescence, Settled};
use super::deploy::Deployer;
use super::pending::PendingArchives;

/// Counters for a finished loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub deployed: usize,
    pub skipped: usize,
    pub aborted: usize,
    /// Archives left in place because they were still being written.
    pub deferred: usize,
    /// Events whose path did not carry the archive extension.
    pub ignored: usize,
}

/// Requests a graceful stop of a [`ReconcileLoop`].
///
/// A cycle in progress runs to completion first; queued archives are
/// dropped and stay on disk.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

enum Wake {
    Shutdown { live: bool },
    Event(Option<ArchiveEvent>),
}

/// The consumer side of the handoff.
///
/// Events are handled one cycle at a time. Events that arrive while a cycle
/// runs wait in a queue keyed by path, so a burst of writes to one archive
/// produces one cycle.
pub struct ReconcileLoop<R: CommandRunner> {
    deployer: Deployer<R>,
    events: mpsc::Receiver<ArchiveEvent>,
    extension: String,
    quiescence: Quiescence,
    shutdown: watch::Receiver<bool>,
    pending: PendingArchives,
    summary: LoopSummary,
    _watcher: Option<WatcherHandle>,
}

impl<R: CommandRunner> ReconcileLoop<R> {
    pub fn new(
        deployer: Deployer<R>,
        events: mpsc::Receiver<ArchiveEvent>,
        extension: impl Into<String>,
        quiescence: Quiescence,
    ) -> (Self, ShutdownHandle) {
        let (tx, shutdown) = watch::channel(false);
        let this = Self {
            deployer,
            events,
            extension: extension.into(),
            quiescence,
            shutdown,
            pending: PendingArchives::new(),
            summary: LoopSummary::default(),
            _watcher: None,
        };
        (this, ShutdownHandle { tx: Arc::new(tx) })
    }

    /// Keep the watcher alive for as long as the loop runs.
    pub fn with_watcher(mut self, watcher: WatcherHandle) -> Self {
        self._watcher = Some(watcher);
        self
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.deployer.subscribe_state()
    }

    /// Run until stopped through the [`ShutdownHandle`].
    ///
    /// Returns `Err(EventStreamClosed)` when the event source goes away
    /// first. Per-archive failures never end the loop.
    pub async fn run(mut self) -> Result<LoopSummary> {
        info!(
            container = %self.deployer.container_name(),
            extension = %self.extension,
            "reconciliation loop started"
        );
        self.deployer.set_state(CycleState::Idle);
        let mut shutdown_live = true;

        loop {
            if *self.shutdown.borrow_and_update() {
                break;
            }

            if let Some(path) = self.pending.pop() {
                self.cycle(&path).await;
                continue;
            }

            let wake = tokio::select! {
                biased;
                changed = self.shutdown.changed(), if shutdown_live => {
                    Wake::Shutdown { live: changed.is_ok() }
                }
                event = self.events.recv() => Wake::Event(event),
            };

            match wake {
                Wake::Shutdown { live } => {
                    if !live {
                        debug!("all shutdown handles dropped");
                        shutdown_live = false;
                    }
                }
                Wake::Event(Some(event)) => self.accept(event),
                Wake::Event(None) => {
                    warn!("filesystem event stream closed");
                    return Err(DockshipError::EventStreamClosed);
                }
            }
        }

        let dropped = self.pending.clear();
        if dropped > 0 {
            info!(dropped, "discarding queued archives on shutdown");
        }
        self.deployer.set_state(CycleState::Stopped);
        info!(summary = ?self.summary, "reconciliation loop stopped");
        Ok(self.summary)
    }

    fn is_archive(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy())
            .is_some_and(|name| name.len() > self.extension.len() && name.ends_with(&self.extension))
    }

    fn accept(&mut self, event: ArchiveEvent) {
        if !self.is_archive(&event.path) {
            debug!(path = %event.path.display(), "ignoring non-archive event");
            self.summary.ignored += 1;
            return;
        }
        debug!(path = %event.path.display(), kind = ?event.kind, "archive event");
        self.pending.push(event.path);
    }

    /// Pull in events that arrived while debouncing `current`. Those for
    /// `current` itself are folded into the running cycle; returns whether
    /// there were any.
    fn absorb_ready_events(&mut self, current: &Path) -> bool {
        let mut touched = false;
        while let Ok(event) = self.events.try_recv() {
            if event.path == current {
                debug!(path = %current.display(), "coalesced event during debounce");
                touched = true;
                continue;
            }
            self.accept(event);
        }
        touched
    }

    async fn cycle(&mut self, path: &Path) {
        self.deployer.set_state(CycleState::Debouncing);
        info!(path = %path.display(), "archive detected; waiting for it to settle");

        let settled = self
            .quiescence
            .settle(self.deployer.fs().as_ref(), path)
            .await;
        let touched = self.absorb_ready_events(path);

        if let Settled::Unstable(size) = settled {
            self.summary.deferred += 1;
            if touched {
                // The writer may already be done; its last events were
                // folded into this cycle, so look again.
                self.pending.push(path.to_path_buf());
            }
            warn!(
                path = %path.display(),
                size,
                requeued = touched,
                "archive still being written; leaving it for the next write event"
            );
            self.deployer.set_state(CycleState::Idle);
            return;
        }

        match self.deployer.process(path).await {
            CycleOutcome::Deployed { warnings } => {
                self.summary.deployed += 1;
                if !warnings.is_empty() {
                    debug!(count = warnings.len(), "cycle finished with warnings");
                }
            }
            CycleOutcome::Skipped => self.summary.skipped += 1,
            CycleOutcome::Aborted { .. } => self.summary.aborted += 1,
        }
        self.deployer.set_state(CycleState::Idle);
    }
}
