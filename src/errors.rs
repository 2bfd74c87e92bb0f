// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockshipError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML encoding error: {0}")]
    TomlEncodeError(#[from] toml::ser::Error),

    /// An external command exited with a non-zero status.
    #[error("command `{command}` failed with exit code {code}: {output}")]
    ExternalCommandFailure {
        command: String,
        code: i32,
        output: String,
    },

    /// An external command exceeded its deadline and was killed.
    #[error("command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// A step reported success but its expected effect is missing.
    #[error("postcondition violated: {0}")]
    PostconditionViolation(String),

    /// Session dial, authentication, host verification or copy protocol failure.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The filesystem event source went away while the loop was running.
    #[error("filesystem event stream closed")]
    EventStreamClosed,

    /// Failure of a named pipeline step.
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<DockshipError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DockshipError {
    /// Wrap `self` with the name of the step that produced it.
    pub fn in_step(self, step: &'static str) -> Self {
        DockshipError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The error underneath any `Step` wrappers.
    pub fn root(&self) -> &DockshipError {
        match self {
            DockshipError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the outermost step, if this error was produced by one.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            DockshipError::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DockshipError>;
