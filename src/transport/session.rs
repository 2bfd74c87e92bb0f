// src/transport/session.rs

//! SSH session handling and the `scp -t` exec channel.
//!
//! `ssh2` is a blocking library, so the whole dial-and-push sequence runs
//! inside `spawn_blocking`.

use std::fs::{File, Metadata};
use std::io::{self, BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ssh2::{Channel, CheckResult, KnownHostFileKind, Session};
use tracing::{debug, info, warn};

use crate::config::{TimeoutsSection, UploaderSection, expand_home};
use crate::errors::{DockshipError, Result};
use crate::exec::shell_quote;

use super::protocol::{FileHeader, PeerChannel, send_file};
use super::{
    HostKeyPolicy, PushFuture, RemoteCopy, RemoteFile, RemoteTarget, SessionCredential,
};

/// Pushes files to a remote directory over SSH.
#[derive(Debug, Clone)]
pub struct SshRemoteCopy {
    target: RemoteTarget,
    credential: SessionCredential,
    policy: HostKeyPolicy,
    connect_timeout: Duration,
    transfer_timeout: Duration,
}

impl SshRemoteCopy {
    pub fn new(
        target: RemoteTarget,
        credential: SessionCredential,
        policy: HostKeyPolicy,
        connect_timeout: Duration,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            target,
            credential,
            policy,
            connect_timeout,
            transfer_timeout,
        }
    }

    /// Build the transport from the `[uploader]` and `[timeouts]` sections.
    pub fn from_config(up: &UploaderSection, timeouts: &TimeoutsSection) -> Self {
        let known_hosts = up
            .known_hosts_path
            .clone()
            .unwrap_or_else(|| expand_home(Path::new("~/.ssh/known_hosts")));
        let policy = if up.insecure_skip_host_key_check {
            HostKeyPolicy::AcceptUnknownWithoutStore
        } else {
            HostKeyPolicy::Verify
        };

        Self::new(
            RemoteTarget {
                host: up.remote_host.clone(),
                port: up.remote_port,
                user: up.remote_user.clone(),
                directory: up.remote_upload_path.clone(),
            },
            SessionCredential {
                private_key: up.remote_key_path.clone(),
                known_hosts,
            },
            policy,
            timeouts.connect.get(),
            timeouts.transfer.get(),
        )
    }

    fn push_blocking(&self, local: &Path, cancelled: Arc<AtomicBool>) -> Result<RemoteFile> {
        let file = File::open(local)?;
        let meta = file.metadata()?;
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DockshipError::TransportFailure(format!("{} has no file name", local.display()))
            })?;
        let header = FileHeader::new(permission_bits(&meta), meta.len(), file_name.as_str());
        let remote_path = self.target.remote_path(&file_name);

        let session = self.connect()?;

        let mut channel = session
            .channel_session()
            .map_err(ssh_failure("opening session channel"))?;
        channel
            .exec(&format!("scp -t {}", shell_quote(&remote_path)))
            .map_err(ssh_failure("starting remote scp"))?;

        debug!(remote = %remote_path, header = %header.encode().trim_end(), "sending file");
        let source = Cancellable::new(BufReader::new(file), cancelled);
        let bytes = send_file(&mut channel, &header, source)?;

        Ok(RemoteFile { remote_path, bytes })
    }

    fn connect(&self) -> Result<Session> {
        let addr = format!("{}:{}", self.target.host, self.target.port);
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| DockshipError::TransportFailure(format!("resolving {addr}: {e}")))?
            .next()
            .ok_or_else(|| DockshipError::TransportFailure(format!("{addr} did not resolve")))?;

        let tcp = TcpStream::connect_timeout(&socket_addr, self.connect_timeout)
            .map_err(|e| DockshipError::TransportFailure(format!("connecting to {addr}: {e}")))?;

        let mut session = Session::new().map_err(ssh_failure("creating session"))?;
        session.set_timeout(millis(self.connect_timeout));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(ssh_failure("SSH handshake"))?;

        self.verify_host(&session)?;

        session
            .userauth_pubkey_file(&self.target.user, None, &self.credential.private_key, None)
            .map_err(ssh_failure("public key authentication"))?;
        if !session.authenticated() {
            return Err(DockshipError::TransportFailure(format!(
                "authentication as {} was rejected",
                self.target.user
            )));
        }

        session.set_timeout(millis(self.transfer_timeout));
        info!(host = %addr, user = %self.target.user, "SSH session established");
        Ok(session)
    }

    fn verify_host(&self, session: &Session) -> Result<()> {
        let store = &self.credential.known_hosts;
        if !store.exists() {
            return self.without_store(format!("known_hosts file {} not found", store.display()));
        }

        let mut known_hosts = session
            .known_hosts()
            .map_err(ssh_failure("initialising known_hosts"))?;
        if let Err(e) = known_hosts.read_file(store, KnownHostFileKind::OpenSSH) {
            return self.without_store(format!("failed to load {}: {e}", store.display()));
        }

        let (key, _key_type) = session.host_key().ok_or_else(|| {
            DockshipError::TransportFailure("server did not present a host key".to_string())
        })?;

        match known_hosts.check_port(&self.target.host, self.target.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::Mismatch => Err(DockshipError::TransportFailure(format!(
                "host key for {} does not match {}",
                self.target.host,
                store.display()
            ))),
            CheckResult::NotFound => Err(DockshipError::TransportFailure(format!(
                "host {} is not listed in {}",
                self.target.host,
                store.display()
            ))),
            CheckResult::Failure => Err(DockshipError::TransportFailure(format!(
                "could not check host key for {}",
                self.target.host
            ))),
        }
    }

    fn without_store(&self, reason: String) -> Result<()> {
        match self.policy {
            HostKeyPolicy::AcceptUnknownWithoutStore => {
                warn!(
                    host = %self.target.host,
                    %reason,
                    "connecting WITHOUT host key verification (insecure_skip_host_key_check = true)"
                );
                Ok(())
            }
            HostKeyPolicy::Verify => Err(DockshipError::TransportFailure(format!(
                "{reason}; set insecure_skip_host_key_check = true to connect without verification"
            ))),
        }
    }
}

impl RemoteCopy for SshRemoteCopy {
    fn push<'a>(&'a self, local: &'a Path) -> PushFuture<'a> {
        Box::pin(async move {
            let this = self.clone();
            let path: PathBuf = local.to_path_buf();
            let cancelled = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancelled);
            let handle = tokio::task::spawn_blocking(move || this.push_blocking(&path, flag));

            match tokio::time::timeout(self.transfer_timeout, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(DockshipError::TransportFailure(format!(
                    "transfer task failed: {join_err}"
                ))),
                Err(_elapsed) => {
                    // The blocking thread notices at its next read and
                    // tears the channel down.
                    cancelled.store(true, Ordering::Relaxed);
                    warn!(
                        remote = %self.describe(),
                        timeout = ?self.transfer_timeout,
                        "transfer timed out; cancelling upload"
                    );
                    Err(DockshipError::Timeout {
                        command: format!("scp -t {}", self.target.directory),
                        timeout: self.transfer_timeout,
                    })
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!(
            "{}@{}:{}",
            self.target.user, self.target.host, self.target.directory
        )
    }
}

fn ssh_failure(context: &'static str) -> impl FnOnce(ssh2::Error) -> DockshipError {
    move |e| DockshipError::TransportFailure(format!("{context}: {e}"))
}

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() { 0o444 } else { 0o644 }
}

impl PeerChannel for Channel {
    fn finish_input(&mut self) -> io::Result<()> {
        self.send_eof()?;
        Ok(())
    }

    fn peer_stderr(&mut self) -> String {
        let mut text = String::new();
        let _ = self.stderr().read_to_string(&mut text);
        text
    }

    fn wait_exit(&mut self) -> io::Result<i32> {
        self.wait_eof()?;
        self.close()?;
        self.wait_close()?;
        Ok(self.exit_status()?)
    }
}

/// Reader that fails with `TimedOut` once `cancelled` is set.
struct Cancellable<R> {
    inner: R,
    cancelled: Arc<AtomicBool>,
}

impl<R> Cancellable<R> {
    fn new(inner: R, cancelled: Arc<AtomicBool>) -> Self {
        Self { inner, cancelled }
    }
}

impl<R: Read> Read for Cancellable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "transfer cancelled"));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_source_stops_the_push() {
        use crate::transport::push_file;
        use std::io::Cursor;

        let flag = Arc::new(AtomicBool::new(false));
        let mut source = Cancellable::new(Cursor::new(vec![7u8; 64]), Arc::clone(&flag));
        let mut buf = [0u8; 16];
        assert_eq!(source.read(&mut buf).unwrap(), 16);

        flag.store(true, Ordering::Relaxed);
        let mut wire = Vec::new();
        let err = push_file(&mut wire, &FileHeader::new(0o644, 48, "a.tar"), source).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(wire, b"C0644 48 a.tar\n");
    }

    #[test]
    fn from_config_requires_opt_in_for_missing_store() {
        let mut up = UploaderSection::default();
        up.remote_host = "deploy.example.com".into();
        up.remote_user = "deploy".into();
        up.remote_upload_path = "/opt/uploads".into();
        let timeouts = TimeoutsSection::default();

        let strict = SshRemoteCopy::from_config(&up, &timeouts);
        assert_eq!(strict.policy, HostKeyPolicy::Verify);
        assert_eq!(strict.describe(), "deploy@deploy.example.com:/opt/uploads");
        assert_eq!(strict.connect_timeout, Duration::from_secs(30));

        up.insecure_skip_host_key_check = true;
        let lax = SshRemoteCopy::from_config(&up, &timeouts);
        assert_eq!(lax.policy, HostKeyPolicy::AcceptUnknownWithoutStore);
    }

    #[test]
    fn missing_store_is_refused_without_opt_in() {
        let copy = SshRemoteCopy::new(
            RemoteTarget {
                host: "h".into(),
                port: 22,
                user: "u".into(),
                directory: "/d".into(),
            },
            SessionCredential {
                private_key: PathBuf::from("/nonexistent/key"),
                known_hosts: PathBuf::from("/nonexistent/known_hosts"),
            },
            HostKeyPolicy::Verify,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let err = copy.without_store("store missing".into()).unwrap_err();
        assert!(matches!(err, DockshipError::TransportFailure(msg) if msg.contains("insecure_skip_host_key_check")));
    }
}
