// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] runs one shell command line with a deadline and classifies
//!   the result, and runs hook sets sequentially.
//! - [`backend`] provides the `CommandRunner` trait and the production
//!   `ShellRunner`, which tests replace with a fake.

pub mod backend;
pub mod command;

pub use backend::{CommandRunner, RunFuture, ShellRunner};
pub use command::{CommandOutput, Outcome, execute, execute_sequence, shell_quote};
