use std::fs;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};

use dockship::transport::FileHeader;

/// What a [`SinkPeer`] accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub header: FileHeader,
    pub path: PathBuf,
    pub content: Vec<u8>,
}

/// Receiving end of the push protocol, the part `scp -t <dir>` plays on the
/// remote host: one header line, `length` raw bytes, then a `\0` marker.
///
/// Files are written into `directory` under the announced name.
#[derive(Debug, Clone)]
pub struct SinkPeer {
    directory: PathBuf,
}

impl SinkPeer {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// Consume one file from `input`. Any protocol violation is an `Err`
    /// with the message a real peer would print before exiting non-zero.
    pub fn receive<R: BufRead>(&self, mut input: R) -> Result<ReceivedFile, String> {
        let mut line = String::new();
        input
            .read_line(&mut line)
            .map_err(|e| format!("reading header: {e}"))?;
        if !line.ends_with('\n') {
            return Err("truncated header".to_string());
        }
        let header = FileHeader::decode(&line)?;

        let mut content = Vec::with_capacity(header.length as usize);
        (&mut input)
            .take(header.length)
            .read_to_end(&mut content)
            .map_err(|e| format!("reading body: {e}"))?;
        if content.len() as u64 != header.length {
            return Err(format!(
                "short body: {} of {} bytes",
                content.len(),
                header.length
            ));
        }

        let mut marker = [0u8; 1];
        input
            .read_exact(&mut marker)
            .map_err(|_| "missing end marker".to_string())?;
        if marker[0] != 0 {
            return Err(format!("bad end marker {:#04x}", marker[0]));
        }

        let path = self.directory.join(&header.name);
        fs::write(&path, &content).map_err(|e| format!("writing {}: {e}", path.display()))?;
        set_mode(&path, header.mode)?;

        Ok(ReceivedFile {
            header,
            path,
            content,
        })
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| format!("setting mode on {}: {e}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), String> {
    Ok(())
}
