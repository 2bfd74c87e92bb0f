// src/reconcile/cycle.rs

//! The reconciliation cycle as a table of steps.
//!
//! Each step names the loop state it runs in and whether its failure ends
//! the cycle. The deployer walks this table in order.

use std::fmt;

use crate::errors::DockshipError;
use crate::types::StepPolicy;

/// Observable state of the reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Debouncing,
    Loading,
    Stopping,
    Starting,
    PostHooks,
    Cleanup,
    /// Terminal; only reached through cancellation.
    Stopped,
}

/// One step of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    PreLoadHooks,
    Load,
    StopPrevious,
    Start,
    PostLoadHooks,
    Cleanup,
}

impl CycleStep {
    pub fn name(self) -> &'static str {
        match self {
            CycleStep::PreLoadHooks => "pre-load hooks",
            CycleStep::Load => "load",
            CycleStep::StopPrevious => "stop previous",
            CycleStep::Start => "start",
            CycleStep::PostLoadHooks => "post-load hooks",
            CycleStep::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub step: CycleStep,
    pub state: CycleState,
    pub policy: StepPolicy,
}

const fn spec(step: CycleStep, state: CycleState, policy: StepPolicy) -> StepSpec {
    StepSpec {
        step,
        state,
        policy,
    }
}

/// Steps run for every archive that is still present after debouncing.
pub const CYCLE: [StepSpec; 6] = [
    spec(CycleStep::PreLoadHooks, CycleState::Loading, StepPolicy::Fatal),
    spec(CycleStep::Load, CycleState::Loading, StepPolicy::Fatal),
    spec(CycleStep::StopPrevious, CycleState::Stopping, StepPolicy::BestEffort),
    spec(CycleStep::Start, CycleState::Starting, StepPolicy::Fatal),
    spec(CycleStep::PostLoadHooks, CycleState::PostHooks, StepPolicy::BestEffort),
    spec(CycleStep::Cleanup, CycleState::Cleanup, StepPolicy::BestEffort),
];

/// How a single cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The new container is running. Best-effort failures are listed.
    Deployed { warnings: Vec<(CycleStep, String)> },
    /// The archive was gone before anything ran.
    Skipped,
    /// A fatal step failed; later steps did not run.
    Aborted {
        step: CycleStep,
        error: DockshipError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_preload_load_and_start_are_fatal() {
        let fatal: Vec<CycleStep> = CYCLE
            .iter()
            .filter(|s| s.policy == StepPolicy::Fatal)
            .map(|s| s.step)
            .collect();
        assert_eq!(
            fatal,
            vec![CycleStep::PreLoadHooks, CycleStep::Load, CycleStep::Start]
        );
    }

    #[test]
    fn stop_runs_before_start_and_cleanup_is_last() {
        let order: Vec<CycleStep> = CYCLE.iter().map(|s| s.step).collect();
        let stop = order.iter().position(|s| *s == CycleStep::StopPrevious).unwrap();
        let start = order.iter().position(|s| *s == CycleStep::Start).unwrap();
        assert!(stop < start);
        assert_eq!(order.last(), Some(&CycleStep::Cleanup));
    }
}
