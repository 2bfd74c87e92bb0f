// src/transport/mod.rs

//! Remote copy transport.
//!
//! - [`protocol`] encodes the push-mode copy protocol and drives one
//!   exchange with any [`PeerChannel`], independent of network code.
//! - [`session`] dials an SSH session with `ssh2` and drives the protocol
//!   over an `scp -t` exec channel.
//!
//! The transfer pipeline only sees the [`RemoteCopy`] trait, so tests can
//! swap in a fake.

pub mod protocol;
pub mod session;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::errors::Result;

pub use protocol::{FileHeader, PeerChannel, push_file, send_file};
pub use session::SshRemoteCopy;

/// Boxed future returned by [`RemoteCopy::push`].
pub type PushFuture<'a> = Pin<Box<dyn Future<Output = Result<RemoteFile>> + Send + 'a>>;

/// Trait abstracting how a local file reaches the remote host.
pub trait RemoteCopy: Send + Sync {
    /// Copy `local` into the remote directory, keeping its base name.
    fn push<'a>(&'a self, local: &'a Path) -> PushFuture<'a>;

    /// Human-readable destination for log lines, e.g. `deploy@host:/dir`.
    fn describe(&self) -> String;
}

/// Where a pushed file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub remote_path: String,
    pub bytes: u64,
}

/// Private key plus the trust store used to verify the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub private_key: PathBuf,
    pub known_hosts: PathBuf,
}

/// What to do when the known-hosts store does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Refuse to connect without a trust store.
    Verify,
    /// Connect without verifying the host (logged as a warning).
    AcceptUnknownWithoutStore,
}

/// The remote end of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Directory the file is copied into.
    pub directory: String,
}

impl RemoteTarget {
    /// `{directory}/{file_name}` on the remote side.
    pub fn remote_path(&self, file_name: &str) -> String {
        let dir = self.directory.trim_end_matches('/');
        if dir.is_empty() {
            format!("/{file_name}")
        } else {
            format!("{dir}/{file_name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_path_joins_without_double_slash() {
        let target = RemoteTarget {
            host: "h".into(),
            port: 22,
            user: "u".into(),
            directory: "/opt/uploads/".into(),
        };
        assert_eq!(target.remote_path("a.tar"), "/opt/uploads/a.tar");
    }
}
