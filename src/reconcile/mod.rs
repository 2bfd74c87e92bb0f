// src/reconcile/mod.rs

//! Consumer side: turn archives that appear in the drop directory into a
//! running container.
//!
//! - `cycle`: the ordered step table and its failure policy.
//! - `deploy`: runs one cycle and answers status/log queries.
//! - `debounce`: waits for an archive to stop growing.
//! - `pending`: queue of archives waiting for a cycle.
//! - `runner`: the long-running loop tying these to the watcher.

pub mod cycle;
pub mod debounce;
pub mod deploy;
pub mod pending;
pub mod runner;

pub use cycle::{CYCLE, CycleOutcome, CycleState, CycleStep, StepSpec};
pub use debounce::{Quiescence, Settled};
pub use deploy::{DeploySettings, Deployer};
pub use pending::PendingArchives;
pub use runner::{LoopSummary, ReconcileLoop, ShutdownHandle};
