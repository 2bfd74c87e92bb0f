use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dockship::errors::DockshipError;
use dockship::transport::{PushFuture, RemoteCopy, RemoteFile};

/// A remote copy that records pushed paths instead of dialing anything.
#[derive(Clone)]
pub struct FakeRemote {
    directory: String,
    failure: Option<String>,
    pushed: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeRemote {
    pub fn new(directory: &str) -> Self {
        Self {
            directory: directory.to_string(),
            failure: None,
            pushed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every push fails with a `TransportFailure` carrying `message`.
    pub fn failing(directory: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(directory)
        }
    }

    /// Paths handed to `push`, including failed attempts.
    pub fn pushed(&self) -> Vec<PathBuf> {
        self.pushed.lock().unwrap().clone()
    }
}

impl RemoteCopy for FakeRemote {
    fn push<'a>(&'a self, local: &'a Path) -> PushFuture<'a> {
        Box::pin(async move {
            self.pushed.lock().unwrap().push(local.to_path_buf());

            if let Some(msg) = &self.failure {
                return Err(DockshipError::TransportFailure(msg.clone()));
            }

            let name = local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(RemoteFile {
                remote_path: format!("{}/{}", self.directory.trim_end_matches('/'), name),
                bytes: 0,
            })
        })
    }

    fn describe(&self) -> String {
        format!("fake:{}", self.directory)
    }
}
