// src/transport/protocol.rs

//! The single-file push mode of the `scp` copy protocol.
//!
//! The sender writes one header line `C<mode> <length> <name>\n`, the raw
//! file bytes, and a single `\0` end marker. The receiving peer (`scp -t`)
//! rejects anything that does not follow this shape.

use std::io::{self, Read, Write};

use crate::errors::{DockshipError, Result};

/// Parsed `C` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Permission bits, e.g. `0o644`.
    pub mode: u32,
    pub length: u64,
    pub name: String,
}

impl FileHeader {
    pub fn new(mode: u32, length: u64, name: impl Into<String>) -> Self {
        Self {
            mode: mode & 0o7777,
            length,
            name: name.into(),
        }
    }

    /// The header line, newline included.
    pub fn encode(&self) -> String {
        format!("C{:04o} {} {}\n", self.mode, self.length, self.name)
    }

    /// Parse a header line (with or without its trailing newline).
    pub fn decode(line: &str) -> std::result::Result<Self, String> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let rest = line
            .strip_prefix('C')
            .ok_or_else(|| format!("expected 'C' record, got {line:?}"))?;

        let mut parts = rest.splitn(3, ' ');
        let mode_str = parts.next().unwrap_or_default();
        let len_str = parts.next().ok_or("header is missing the length field")?;
        let name = parts.next().ok_or("header is missing the file name")?;

        if mode_str.len() != 4 || !mode_str.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(format!("invalid mode {mode_str:?}"));
        }
        let mode = u32::from_str_radix(mode_str, 8).map_err(|e| format!("invalid mode: {e}"))?;
        let length: u64 = len_str
            .parse()
            .map_err(|e| format!("invalid length {len_str:?}: {e}"))?;

        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(format!("invalid file name {name:?}"));
        }

        Ok(Self {
            mode,
            length,
            name: name.to_string(),
        })
    }
}

/// Write `header`, then exactly `header.length` bytes from `source`, then
/// the end marker.
///
/// Fails with `UnexpectedEof` if `source` is shorter than announced.
pub fn push_file<W, R>(sink: &mut W, header: &FileHeader, source: R) -> io::Result<u64>
where
    W: Write + ?Sized,
    R: Read,
{
    sink.write_all(header.encode().as_bytes())?;

    let copied = io::copy(&mut source.take(header.length), sink)?;
    if copied != header.length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "source ended after {copied} of {} bytes",
                header.length
            ),
        ));
    }

    sink.write_all(&[0])?;
    sink.flush()?;
    Ok(copied)
}

/// A running `scp -t` peer: its stdin and stdout through `Write` and
/// `Read`, plus its stderr and exit status once input is closed.
pub trait PeerChannel: Read + Write {
    /// Close the peer's input so it can finish.
    fn finish_input(&mut self) -> io::Result<()>;

    /// Whatever the peer wrote to stderr.
    fn peer_stderr(&mut self) -> String;

    /// Wait for the peer to exit and return its status.
    fn wait_exit(&mut self) -> io::Result<i32>;
}

/// Push one file to `peer` and check how the peer took it.
///
/// A non-zero peer exit is a `TransportFailure` carrying the peer's own
/// message, also when writing failed because the peer hung up early.
pub fn send_file<C, R>(peer: &mut C, header: &FileHeader, source: R) -> Result<u64>
where
    C: PeerChannel,
    R: Read,
{
    let pushed = push_file(peer, header, source);
    let closed = peer.finish_input();

    // Acks (`\0`) and error records (`\x01msg`) arrive on stdout.
    let mut replies = Vec::new();
    let _ = peer.read_to_end(&mut replies);
    let stderr = peer.peer_stderr();

    let status = peer
        .wait_exit()
        .map_err(|e| DockshipError::TransportFailure(format!("waiting for remote scp: {e}")))?;
    if status != 0 {
        return Err(DockshipError::TransportFailure(format!(
            "remote scp exited with status {status}: {}",
            peer_message(&replies, &stderr)
        )));
    }

    let sent = pushed.map_err(|e| {
        DockshipError::TransportFailure(format!("streaming {}: {e}", header.name))
    })?;
    closed.map_err(|e| DockshipError::TransportFailure(format!("closing remote input: {e}")))?;
    Ok(sent)
}

/// Best message to show for a failed remote `scp`: error records from
/// stdout, then stderr.
pub(crate) fn peer_message(replies: &[u8], stderr: &str) -> String {
    let text: String = String::from_utf8_lossy(replies)
        .chars()
        .filter(|c| *c != '\0' && *c != '\u{1}' && *c != '\u{2}')
        .collect();
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    let stderr = stderr.trim();
    if stderr.is_empty() {
        "no message from peer".to_string()
    } else {
        stderr.to_string()
    }
}
