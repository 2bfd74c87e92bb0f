// src/reconcile/deploy.rs

//! Runs one reconciliation cycle for one archive, and answers status/log
//! queries about the managed container.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::archive::format_bytes;
use crate::config::ConfigFile;
use crate::container::{ContainerCli, ContainerSpec};
use crate::errors::{DockshipError, Result};
use crate::exec::{CommandRunner, execute_sequence};
use crate::fs::FileSystem;
use crate::types::StepPolicy;

use super::cycle::{CYCLE, CycleOutcome, CycleState, CycleStep};

/// Inputs of every cycle.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub container: ContainerSpec,
    pub pre_load_commands: Vec<String>,
    pub post_load_commands: Vec<String>,
    pub hook_timeout: Duration,
    pub load_timeout: Duration,
    pub stop_timeout: Duration,
    pub run_timeout: Duration,
    pub status_timeout: Duration,
    pub logs_timeout: Duration,
}

impl DeploySettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let t = &cfg.timeouts;
        Self {
            container: ContainerSpec::from_watcher(&cfg.watcher),
            pre_load_commands: cfg.watcher.pre_load_commands.clone(),
            post_load_commands: cfg.watcher.post_load_commands.clone(),
            hook_timeout: t.hook.get(),
            load_timeout: t.load.get(),
            stop_timeout: t.stop.get(),
            run_timeout: t.run.get(),
            status_timeout: t.status.get(),
            logs_timeout: t.logs.get(),
        }
    }
}

/// Replaces the managed container from an archive.
pub struct Deployer<R: CommandRunner> {
    runner: R,
    fs: Arc<dyn FileSystem>,
    cli: ContainerCli,
    settings: DeploySettings,
    state: watch::Sender<CycleState>,
}

impl<R: CommandRunner> Deployer<R> {
    pub fn new(
        runner: R,
        fs: Arc<dyn FileSystem>,
        cli: ContainerCli,
        settings: DeploySettings,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            runner,
            fs,
            cli,
            settings,
            state,
        }
    }

    pub fn container_name(&self) -> &str {
        &self.settings.container.name
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Follow state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: CycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "cycle state");
        }
    }

    /// Run the full cycle for `archive`.
    ///
    /// Never returns an error: fatal step failures are logged and reported
    /// as [`CycleOutcome::Aborted`] so the caller can keep watching.
    pub async fn process(&self, archive: &Path) -> CycleOutcome {
        if !self.fs.is_file(archive) {
            info!(archive = %archive.display(), "archive no longer exists; skipping");
            return CycleOutcome::Skipped;
        }

        match self.fs.file_size(archive) {
            Ok(size) => info!(
                archive = %archive.display(),
                size = %format_bytes(size),
                "processing archive"
            ),
            Err(e) => warn!(archive = %archive.display(), error = %e, "failed to read archive size"),
        }

        let mut warnings = Vec::new();
        for spec in CYCLE.iter() {
            self.set_state(spec.state);
            let result = self.run_step(spec.step, archive).await;

            match (result, spec.policy) {
                (Ok(()), _) => {}
                (Err(err), StepPolicy::Fatal) => {
                    error!(
                        archive = %archive.display(),
                        step = %spec.step,
                        error = %err,
                        "cycle aborted"
                    );
                    if spec.step == CycleStep::Start {
                        error!(
                            container = %self.settings.container.name,
                            "no container is running after failed start"
                        );
                    }
                    return CycleOutcome::Aborted {
                        step: spec.step,
                        error: err,
                    };
                }
                (Err(err), StepPolicy::BestEffort) => {
                    warn!(step = %spec.step, error = %err, "step failed; continuing");
                    warnings.push((spec.step, err.to_string()));
                }
            }
        }

        info!(
            archive = %archive.display(),
            container = %self.settings.container.name,
            "archive processed; container replaced"
        );
        CycleOutcome::Deployed { warnings }
    }

    async fn run_step(&self, step: CycleStep, archive: &Path) -> Result<()> {
        match step {
            CycleStep::PreLoadHooks => {
                execute_sequence(&self.runner, &self.settings.pre_load_commands, self.settings.hook_timeout)
                    .await
            }
            CycleStep::Load => self.load(archive).await,
            CycleStep::StopPrevious => {
                self.stop_and_remove().await;
                Ok(())
            }
            CycleStep::Start => self.start().await,
            CycleStep::PostLoadHooks => {
                execute_sequence(&self.runner, &self.settings.post_load_commands, self.settings.hook_timeout)
                    .await
            }
            CycleStep::Cleanup => {
                info!(archive = %archive.display(), "removing processed archive");
                self.fs.remove_file(archive).map_err(DockshipError::from)
            }
        }
    }

    async fn load(&self, archive: &Path) -> Result<()> {
        info!(archive = %archive.display(), "loading image from archive");
        let output = self
            .runner
            .run(&self.cli.load(archive), self.settings.load_timeout)
            .await?
            .into_result()?;
        debug!(output = %output.trim(), "load output");
        Ok(())
    }

    /// Stop and remove the previous container. It may not exist, so
    /// failures are only logged at debug level.
    async fn stop_and_remove(&self) {
        let name = &self.settings.container.name;
        info!(container = %name, "stopping and removing existing container");

        for cmd in [self.cli.stop(name), self.cli.remove(name)] {
            match self.run_removal(&cmd).await {
                Ok(()) => debug!(cmd = %cmd, "ok"),
                Err(DockshipError::NotFound(what)) => debug!(cmd = %cmd, "{what} does not exist"),
                Err(e) => debug!(cmd = %cmd, error = %e, "failed"),
            }
        }
    }

    async fn run_removal(&self, cmd: &str) -> Result<()> {
        self.runner
            .run(cmd, self.settings.stop_timeout)
            .await?
            .into_result()
            .map(|_| ())
            .map_err(|e| absent_as_not_found(e, &self.settings.container.name))
    }

    async fn start(&self) -> Result<()> {
        let cmd = self.cli.run(&self.settings.container);
        info!(container = %self.settings.container.name, cmd = %cmd, "starting new container");

        let output = self
            .runner
            .run(&cmd, self.settings.run_timeout)
            .await?
            .into_result()?;
        debug!(output = %output.trim(), "run output");
        info!(container = %self.settings.container.name, "container started");
        Ok(())
    }

    /// Status string of the managed container; empty when it does not exist.
    pub async fn status(&self) -> Result<String> {
        let cmd = self.cli.status(&self.settings.container.name);
        let output = self
            .runner
            .run(&cmd, self.settings.status_timeout)
            .await?
            .into_result()?;
        Ok(output.trim().to_string())
    }

    /// Last `lines` lines of the managed container's output.
    pub async fn logs(&self, lines: usize) -> Result<String> {
        let cmd = self.cli.logs(&self.settings.container.name, lines);
        self.runner
            .run(&cmd, self.settings.logs_timeout)
            .await?
            .into_result()
    }
}

/// Turn the runtime's "no such container" failure into `NotFound`.
fn absent_as_not_found(err: DockshipError, name: &str) -> DockshipError {
    match err {
        DockshipError::ExternalCommandFailure { ref output, .. } if reports_missing(output) => {
            DockshipError::NotFound(format!("container {name}"))
        }
        other => other,
    }
}

/// docker: "No such container", podman: "no container with name or ID".
fn reports_missing(output: &str) -> bool {
    let output = output.to_ascii_lowercase();
    output.contains("no such container") || output.contains("no container with name or id")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(output: &str) -> DockshipError {
        DockshipError::ExternalCommandFailure {
            command: "docker stop web".into(),
            code: 1,
            output: output.into(),
        }
    }

    #[test]
    fn missing_container_becomes_not_found() {
        let docker = absent_as_not_found(failure("Error response from daemon: No such container: web"), "web");
        assert!(matches!(docker, DockshipError::NotFound(ref what) if what == "container web"));

        let podman = absent_as_not_found(
            failure("Error: no container with name or ID \"web\" found: no such container"),
            "web",
        );
        assert!(matches!(podman, DockshipError::NotFound(_)));
    }

    #[test]
    fn other_failures_are_kept() {
        let err = absent_as_not_found(failure("permission denied"), "web");
        assert!(matches!(err, DockshipError::ExternalCommandFailure { code: 1, .. }));

        let timeout = DockshipError::Timeout {
            command: "docker stop web".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(matches!(absent_as_not_found(timeout, "web"), DockshipError::Timeout { .. }));
    }
}
