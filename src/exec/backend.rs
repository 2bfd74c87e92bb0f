// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! The pipelines talk to a `CommandRunner` instead of spawning processes
//! directly. Production code uses [`ShellRunner`]; tests can provide a fake
//! that records command lines and returns scripted outcomes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;

use super::command::{CommandOutput, execute};

/// Boxed future returned by [`CommandRunner::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<CommandOutput>> + Send + 'a>>;

/// Trait abstracting how a command line is executed.
pub trait CommandRunner: Send + Sync {
    /// Run `command` with the given deadline.
    ///
    /// Non-zero exits and timeouts are reported through
    /// [`CommandOutput::outcome`]; `Err` means the command could not be run
    /// at all.
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a>;
}

/// Runs commands through `sh -c` on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str, timeout: Duration) -> RunFuture<'a> {
        Box::pin(execute(command, timeout))
    }
}
