// tests/remote_copy_protocol.rs

mod common;

use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use common::{TestResult, init_tracing};
use dockship::errors::DockshipError;
use dockship::transport::{FileHeader, PeerChannel, push_file, send_file};
use dockship_test_utils::sink_peer::SinkPeer;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[test]
fn pushed_file_arrives_with_exact_length_and_content() -> TestResult {
    init_tracing();
    let dest = tempfile::tempdir()?;
    let data = payload(70_000);
    let header = FileHeader::new(0o640, data.len() as u64, "myapp_latest_20260101-120000.tar");

    let mut wire = Vec::new();
    let sent = push_file(&mut wire, &header, Cursor::new(&data))?;
    assert_eq!(sent, data.len() as u64);

    let received = SinkPeer::new(dest.path()).receive(Cursor::new(wire))?;

    assert_eq!(received.header, header);
    assert_eq!(received.content, data);
    assert_eq!(std::fs::read(&received.path)?, data);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&received.path)?.permissions().mode() & 0o7777;
        assert_eq!(mode, 0o640);
    }
    Ok(())
}

#[test]
fn empty_file_round_trips() -> TestResult {
    let dest = tempfile::tempdir()?;
    let header = FileHeader::new(0o644, 0, "empty.tar");

    let mut wire = Vec::new();
    push_file(&mut wire, &header, Cursor::new(Vec::<u8>::new()))?;
    assert_eq!(wire, b"C0644 0 empty.tar\n\0");

    let received = SinkPeer::new(dest.path()).receive(Cursor::new(wire))?;
    assert!(received.content.is_empty());
    Ok(())
}

#[test]
fn corrupted_header_makes_the_peer_fail() -> TestResult {
    let dest = tempfile::tempdir()?;
    let data = payload(16);
    let header = FileHeader::new(0o644, 16, "app.tar");

    let mut wire = Vec::new();
    push_file(&mut wire, &header, Cursor::new(&data))?;
    wire[0] = b'X';

    let err = SinkPeer::new(dest.path())
        .receive(Cursor::new(wire))
        .unwrap_err();
    assert!(!err.is_empty());
    assert!(!dest.path().join("app.tar").exists());
    Ok(())
}

#[test]
fn understated_length_leaves_a_bad_end_marker() -> TestResult {
    let dest = tempfile::tempdir()?;
    let data = payload(16);

    // The header claims 8 bytes but the whole 16-byte body follows.
    let mut wire = FileHeader::new(0o644, 8, "app.tar").encode().into_bytes();
    wire.extend_from_slice(&data);
    wire.push(0);

    let err = SinkPeer::new(dest.path())
        .receive(Cursor::new(wire))
        .unwrap_err();
    assert!(err.contains("end marker"));
    Ok(())
}

#[test]
fn short_source_is_an_error_for_the_sender() {
    let header = FileHeader::new(0o644, 100, "app.tar");
    let mut wire = Vec::new();
    let err = push_file(&mut wire, &header, Cursor::new(vec![1u8; 10])).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

/// A local `scp -t` standing in for the remote end of an SSH channel.
struct LocalScp {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
}

impl LocalScp {
    /// `None` when no `scp` binary is installed.
    fn spawn(target: &Path) -> Option<Self> {
        let spawned = Command::new("scp")
            .arg("-t")
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => panic!("failed to start scp: {e}"),
        };
        let stdin = child.stdin.take();
        let stdout = child.stdout.take().expect("stdout is piped");
        Some(Self {
            child,
            stdin,
            stdout,
        })
    }
}

impl Read for LocalScp {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Write for LocalScp {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write(buf),
            None => Err(io::ErrorKind::BrokenPipe.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }
}

impl PeerChannel for LocalScp {
    fn finish_input(&mut self) -> io::Result<()> {
        drop(self.stdin.take());
        Ok(())
    }

    fn peer_stderr(&mut self) -> String {
        let mut text = String::new();
        if let Some(mut stderr) = self.child.stderr.take() {
            let _ = stderr.read_to_string(&mut text);
        }
        text
    }

    fn wait_exit(&mut self) -> io::Result<i32> {
        Ok(self.child.wait()?.code().unwrap_or(-1))
    }
}

#[test]
fn scp_peer_receives_the_exact_bytes() -> TestResult {
    init_tracing();
    let dest = tempfile::tempdir()?;
    let target = dest.path().join("a.tar");
    let Some(mut peer) = LocalScp::spawn(&target) else {
        eprintln!("scp not installed; skipping");
        return Ok(());
    };
    let data = payload(200_000);
    let header = FileHeader::new(0o640, data.len() as u64, "a.tar");

    let sent = send_file(&mut peer, &header, Cursor::new(&data))?;

    assert_eq!(sent, data.len() as u64);
    assert_eq!(std::fs::read(&target)?, data);
    Ok(())
}

/// Passes everything through to the peer except that the first byte of
/// the header is replaced.
struct GarbledHeader<'a> {
    peer: &'a mut LocalScp,
    sent_first: bool,
}

impl Read for GarbledHeader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.peer.read(buf)
    }
}

impl Write for GarbledHeader<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.sent_first && !buf.is_empty() {
            self.sent_first = true;
            return self.peer.write(b"X").map(|_| 1);
        }
        self.peer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.peer.flush()
    }
}

impl PeerChannel for GarbledHeader<'_> {
    fn finish_input(&mut self) -> io::Result<()> {
        self.peer.finish_input()
    }

    fn peer_stderr(&mut self) -> String {
        self.peer.peer_stderr()
    }

    fn wait_exit(&mut self) -> io::Result<i32> {
        self.peer.wait_exit()
    }
}

#[test]
fn scp_peer_rejecting_the_header_is_a_transport_failure() -> TestResult {
    init_tracing();
    let dest = tempfile::tempdir()?;
    let target = dest.path().join("a.tar");
    let Some(mut peer) = LocalScp::spawn(&target) else {
        eprintln!("scp not installed; skipping");
        return Ok(());
    };
    let data = payload(200_000);
    let header = FileHeader::new(0o640, data.len() as u64, "a.tar");

    let mut garbled = GarbledHeader {
        peer: &mut peer,
        sent_first: false,
    };
    let err = send_file(&mut garbled, &header, Cursor::new(&data)).unwrap_err();

    match err {
        DockshipError::TransportFailure(msg) => {
            assert!(msg.contains("remote scp exited with status"), "{msg}");
            assert!(msg.contains("X0640 200000 a.tar"), "{msg}");
        }
        other => panic!("expected TransportFailure, got {other:?}"),
    }
    assert!(!target.exists());
    Ok(())
}
