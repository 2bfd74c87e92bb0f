// src/exec/command.rs

//! Run a single shell command line with a deadline.

use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{DockshipError, Result};

/// How long to keep collecting output after the shell itself exited.
///
/// A command that backgrounds a child keeps our pipes open; we stop
/// reading after this grace period instead of waiting for it.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Classification of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NonZeroExit { code: i32, output: String },
    TimedOut,
}

/// Result of running one command line.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    /// Interleaved stdout and stderr, one line per entry in arrival order.
    pub output: String,
    pub outcome: Outcome,
    pub timeout: Duration,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Turn a non-successful outcome into the matching error, returning the
    /// captured output on success.
    pub fn into_result(self) -> Result<String> {
        match self.outcome {
            Outcome::Success => Ok(self.output),
            Outcome::NonZeroExit { code, output } => Err(DockshipError::ExternalCommandFailure {
                command: self.command,
                code,
                output: output.trim().to_string(),
            }),
            Outcome::TimedOut => Err(DockshipError::Timeout {
                command: self.command,
                timeout: self.timeout,
            }),
        }
    }
}

/// Run `command` through the platform shell, waiting at most `timeout`.
///
/// On timeout the whole process group is killed and reaped before this
/// returns. `Err` is reserved for failures to spawn or wait on the shell.
pub async fn execute(command: &str, timeout: Duration) -> Result<CommandOutput> {
    let started = Instant::now();
    debug!(cmd = %command, ?timeout, "spawning command");

    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so a timeout can take down pipelines and children.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning shell for command `{command}`"))?;

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, line_tx.clone());
    }
    drop(line_tx);

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            Some(status.with_context(|| format!("waiting for command `{command}`"))?)
        }
        Err(_elapsed) => {
            warn!(cmd = %command, ?timeout, "command timed out; killing process group");
            kill_process_tree(&mut child).await;
            None
        }
    };

    let mut output = String::new();
    let drain = async {
        while let Some(line) = line_rx.recv().await {
            output.push_str(&line);
            output.push('\n');
        }
    };
    if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
        debug!(cmd = %command, "output pipes still open after exit; not waiting further");
    }

    let outcome = match status {
        None => Outcome::TimedOut,
        Some(status) if status.success() => Outcome::Success,
        Some(status) => Outcome::NonZeroExit {
            code: status.code().unwrap_or(-1),
            output: output.clone(),
        },
    };

    let elapsed = started.elapsed();
    debug!(cmd = %command, ?outcome, ?elapsed, "command finished");

    Ok(CommandOutput {
        command: command.to_string(),
        output,
        outcome,
        timeout,
        elapsed,
    })
}

/// Run each non-blank command in order, stopping at the first failure.
///
/// An empty (or all-blank) list spawns nothing.
pub async fn execute_sequence<R>(runner: &R, commands: &[String], timeout: Duration) -> Result<()>
where
    R: super::CommandRunner + ?Sized,
{
    let commands: Vec<&str> = commands
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    if commands.is_empty() {
        debug!("nothing to run");
        return Ok(());
    }

    for command in commands {
        info!(cmd = %command, "executing command");
        let output = runner.run(command, timeout).await?;
        let text = output.into_result()?;
        let text = text.trim();
        if !text.is_empty() {
            debug!(cmd = %command, output = %text, "command output");
        }
    }

    Ok(())
}

/// Quote `arg` for `sh` unless it is made only of characters that never
/// need quoting.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

fn spawn_line_reader<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

async fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(pid, error = %e, "failed to signal process group");
        }
    }

    // Kills the shell if still alive and reaps it.
    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill timed-out command");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_leaves_plain_words_alone() {
        assert_eq!(shell_quote("web"), "web");
        assert_eq!(shell_quote("8080:80"), "8080:80");
        assert_eq!(shell_quote("/srv/in/app_v1.tar"), "/srv/in/app_v1.tar");
    }

    #[test]
    fn quoting_wraps_spaces_and_quotes() {
        assert_eq!(shell_quote("GREETING=hello world"), "'GREETING=hello world'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a;rm -rf /"), "'a;rm -rf /'");
    }

    #[tokio::test]
    async fn pipes_and_redirects_work_as_written() {
        let out = execute("printf 'a\\nb\\n' | wc -l 1>&2", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.output.trim(), "2");
    }

    #[tokio::test]
    async fn non_zero_exit_carries_code_and_output() {
        let out = execute("echo boom; exit 3", Duration::from_secs(5))
            .await
            .unwrap();
        match &out.outcome {
            Outcome::NonZeroExit { code, output } => {
                assert_eq!(*code, 3);
                assert!(output.contains("boom"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
        let err = out.into_result().unwrap_err();
        assert!(matches!(err, DockshipError::ExternalCommandFailure { code: 3, .. }));
    }
}
