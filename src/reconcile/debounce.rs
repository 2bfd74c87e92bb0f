// src/reconcile/debounce.rs

//! Waiting for an archive to stop changing before it is loaded.
//!
//! A fixed delay absorbs the usual create/write burst. After that the file
//! size is polled until two consecutive reads agree.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ConfigFile;
use crate::fs::FileSystem;

/// Result of waiting on an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Size held steady across a poll interval.
    Stable(u64),
    /// Still changing after the last poll.
    Unstable(u64),
    /// The file disappeared while waiting.
    Vanished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quiescence {
    pub delay: Duration,
    pub poll: Duration,
    /// Zero disables polling; the archive is taken as is after `delay`.
    pub max_polls: u32,
}

impl Quiescence {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            delay: cfg.watcher.debounce.get(),
            poll: cfg.watcher.stability_poll.get(),
            max_polls: cfg.watcher.stability_max_polls,
        }
    }

    pub async fn settle(&self, fs: &dyn FileSystem, path: &Path) -> Settled {
        tokio::time::sleep(self.delay).await;

        let mut last = match fs.file_size(path) {
            Ok(size) => size,
            Err(_) => return Settled::Vanished,
        };
        if self.max_polls == 0 {
            return Settled::Stable(last);
        }

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll).await;
            match fs.file_size(path) {
                Ok(size) if size == last => {
                    debug!(path = %path.display(), size, attempt, "archive size stable");
                    return Settled::Stable(size);
                }
                Ok(size) => {
                    debug!(path = %path.display(), from = last, to = size, "archive still growing");
                    last = size;
                }
                Err(_) => return Settled::Vanished,
            }
        }

        warn!(
            path = %path.display(),
            size = last,
            polls = self.max_polls,
            "archive size did not settle"
        );
        Settled::Unstable(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::path::PathBuf;

    fn quick(max_polls: u32) -> Quiescence {
        Quiescence {
            delay: Duration::from_millis(5),
            poll: Duration::from_millis(5),
            max_polls,
        }
    }

    #[tokio::test]
    async fn waits_until_size_stops_changing() {
        let fs = MockFileSystem::new();
        let path = PathBuf::from("/in/web.tar");
        fs.add_growing_file(&path, &[10, 20, 30, 30]);

        assert_eq!(quick(10).settle(&fs, &path).await, Settled::Stable(30));
        assert_eq!(fs.size_calls(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_max_polls() {
        let fs = MockFileSystem::new();
        let path = PathBuf::from("/in/web.tar");
        fs.add_growing_file(&path, &[1, 2, 3, 4, 5, 6]);

        assert_eq!(quick(2).settle(&fs, &path).await, Settled::Unstable(3));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let fs = MockFileSystem::new();
        assert_eq!(
            quick(3).settle(&fs, Path::new("/in/gone.tar")).await,
            Settled::Vanished
        );
    }

    #[tokio::test]
    async fn zero_polls_takes_file_after_delay() {
        let fs = MockFileSystem::new();
        let path = PathBuf::from("/in/web.tar");
        fs.add_file(&path, 42);
        assert_eq!(quick(0).settle(&fs, &path).await, Settled::Stable(42));
        assert_eq!(fs.size_calls(), 1);
    }
}
