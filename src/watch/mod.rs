// src/watch/mod.rs

//! Watching the drop directory for incoming archives.
//!
//! This module only turns notify events into [`ArchiveEvent`]s. Filtering by
//! archive extension and deciding what to do belongs to the reconcile loop.

pub mod watcher;

pub use watcher::{ArchiveEvent, ArchiveEventKind, WatcherHandle, classify, spawn_watcher};
