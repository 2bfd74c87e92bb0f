// src/reconcile/pending.rs

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Archives waiting for a cycle, in arrival order.
///
/// A path is queued at most once: further events for a path that is already
/// waiting coalesce into the existing entry.
#[derive(Debug, Default)]
pub struct PendingArchives {
    queue: VecDeque<PathBuf>,
}

impl PendingArchives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns false when the path was already waiting.
    pub fn push(&mut self, path: PathBuf) -> bool {
        if self.contains(&path) {
            debug!(path = %path.display(), "coalesced event for queued archive");
            return false;
        }
        self.queue.push_back(path);
        true
    }

    pub fn pop(&mut self) -> Option<PathBuf> {
        self.queue.pop_front()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.queue.iter().any(|p| p == path)
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}
