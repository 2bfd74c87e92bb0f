// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Context;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::Result;

/// What happened to a file in the watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEventKind {
    /// Created, or moved in from elsewhere.
    Created,
    /// Content written.
    Written,
}

/// A create or write notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEvent {
    pub path: PathBuf,
    pub kind: ArchiveEventKind,
}

impl ArchiveEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArchiveEventKind::Created,
        }
    }

    pub fn written(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArchiveEventKind::Written,
        }
    }
}

/// Map a notify event kind onto the two kinds the loop reacts to.
///
/// Removals, metadata changes and access events yield `None`.
pub fn classify(kind: &EventKind) -> Option<ArchiveEventKind> {
    match kind {
        EventKind::Create(_) => Some(ArchiveEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)) => {
            Some(ArchiveEventKind::Created)
        }
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Some(ArchiveEventKind::Written),
        _ => None,
    }
}

/// Handle for the directory watcher.
///
/// Dropping it stops watching; the forwarding task then ends and the
/// receiving side sees a closed channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    directory: PathBuf,
}

impl WatcherHandle {
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("directory", &self.directory)
            .finish()
    }
}

/// Watch `directory` (not recursively) and forward create/write events.
///
/// The directory is created when missing. Every affected path of a matching
/// notify event becomes one [`ArchiveEvent`] on `events_tx`.
pub fn spawn_watcher(
    directory: impl Into<PathBuf>,
    events_tx: mpsc::Sender<ArchiveEvent>,
) -> Result<WatcherHandle> {
    let directory = directory.into();
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("creating watch directory {:?}", directory))?;
    let directory = directory.canonicalize().unwrap_or(directory);

    // Channel from the blocking notify callback into the async world.
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if raw_tx.send(event).is_err() {
                    debug!("watch event dropped; forwarder gone");
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {:?}", directory))?;

    debug!(directory = %directory.display(), "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = raw_rx.recv().await {
            let Some(kind) = classify(&event.kind) else {
                debug!(kind = ?event.kind, "ignoring notify event");
                continue;
            };

            for path in event.paths {
                debug!(path = %path.display(), ?kind, "forwarding archive event");
                if events_tx.send(ArchiveEvent { path, kind }).await.is_err() {
                    debug!("event receiver closed; watcher forwarder exiting");
                    return;
                }
            }
        }
        debug!("file watcher stream ended");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn creates_and_writes_are_forwarded() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(ArchiveEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(ArchiveEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ArchiveEventKind::Written)
        );
    }

    #[test]
    fn removals_and_metadata_are_ignored() {
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), None);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            None
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            None
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
    }
}
