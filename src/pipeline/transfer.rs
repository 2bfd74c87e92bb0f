// src/pipeline/transfer.rs

//! Build an image, export it to an archive and push it to the deploy host.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::config::ConfigFile;
use crate::container::ContainerCli;
use crate::errors::{DockshipError, Result};
use crate::exec::{CommandRunner, execute_sequence};
use crate::fs::FileSystem;
use crate::transport::{RemoteCopy, RemoteFile};

pub const STEP_PRE_BUILD: &str = "pre-build hooks";
pub const STEP_BUILD: &str = "build";
pub const STEP_EXPORT: &str = "export";
pub const STEP_TRANSFER: &str = "transfer";
pub const STEP_POST_BUILD: &str = "post-build hooks";

/// Inputs of one transfer run.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub image_name: String,
    pub image_tag: String,
    pub build_path: PathBuf,
    pub archive_dir: PathBuf,
    pub archive_extension: String,
    /// Replaces the default build command when set.
    pub build_command: Option<String>,
    pub pre_build_commands: Vec<String>,
    pub post_build_commands: Vec<String>,
    pub hook_timeout: Duration,
    pub build_timeout: Duration,
    pub export_timeout: Duration,
}

impl TransferSettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let up = &cfg.uploader;
        Self {
            image_name: up.image_name.clone(),
            image_tag: up.image_tag.clone(),
            build_path: up.build_path.clone(),
            archive_dir: up.archive_dir.clone(),
            archive_extension: cfg.watcher.archive_extension.clone(),
            build_command: up
                .build_command
                .clone()
                .filter(|c| !c.trim().is_empty()),
            pre_build_commands: up.pre_build_commands.clone(),
            post_build_commands: up.post_build_commands.clone(),
            hook_timeout: cfg.timeouts.hook.get(),
            build_timeout: cfg.timeouts.build.get(),
            export_timeout: cfg.timeouts.export.get(),
        }
    }

    /// `name:tag`
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image_name, self.image_tag)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub archive: Archive,
    pub remote: RemoteFile,
    /// False when deleting the local archive failed.
    pub cleaned_up: bool,
}

/// The producer side of the handoff.
///
/// Every step is fatal except the final local cleanup. A failed transfer
/// leaves the archive on disk so it can be inspected or pushed again.
pub struct TransferPipeline<R: CommandRunner, C: RemoteCopy> {
    runner: R,
    remote: C,
    fs: Arc<dyn FileSystem>,
    cli: ContainerCli,
    settings: TransferSettings,
}

impl<R: CommandRunner, C: RemoteCopy> TransferPipeline<R, C> {
    pub fn new(
        runner: R,
        remote: C,
        fs: Arc<dyn FileSystem>,
        cli: ContainerCli,
        settings: TransferSettings,
    ) -> Self {
        Self {
            runner,
            remote,
            fs,
            cli,
            settings,
        }
    }

    pub async fn run(&self) -> Result<TransferReport> {
        info!(image = %self.settings.image_ref(), "starting transfer pipeline");

        self.run_hooks(&self.settings.pre_build_commands, "pre-build")
            .await
            .map_err(|e| e.in_step(STEP_PRE_BUILD))?;

        self.build().await.map_err(|e| e.in_step(STEP_BUILD))?;

        let archive = self.export().await.map_err(|e| e.in_step(STEP_EXPORT))?;

        let remote = self
            .transfer(&archive)
            .await
            .map_err(|e| e.in_step(STEP_TRANSFER))?;

        self.run_hooks(&self.settings.post_build_commands, "post-build")
            .await
            .map_err(|e| e.in_step(STEP_POST_BUILD))?;

        let cleaned_up = self.cleanup(&archive);

        info!(image = %self.settings.image_ref(), "transfer pipeline completed");
        Ok(TransferReport {
            archive,
            remote,
            cleaned_up,
        })
    }

    async fn run_hooks(&self, commands: &[String], phase: &str) -> Result<()> {
        if !commands.iter().any(|c| !c.trim().is_empty()) {
            debug!(phase, "no hooks configured");
            return Ok(());
        }
        info!(phase, count = commands.len(), "executing hooks");
        execute_sequence(&self.runner, commands, self.settings.hook_timeout).await
    }

    fn build_command(&self) -> String {
        match &self.settings.build_command {
            Some(cmd) => cmd.clone(),
            None => self
                .cli
                .build(&self.settings.image_ref(), &self.settings.build_path),
        }
    }

    async fn build(&self) -> Result<()> {
        let cmd = self.build_command();
        info!(image = %self.settings.image_ref(), cmd = %cmd, "building image");

        let output = self
            .runner
            .run(&cmd, self.settings.build_timeout)
            .await?
            .into_result()?;
        debug!(output = %output.trim(), "build output");
        Ok(())
    }

    async fn export(&self) -> Result<Archive> {
        let s = &self.settings;
        if !s.archive_dir.as_os_str().is_empty() {
            self.fs.create_dir_all(&s.archive_dir)?;
        }

        let mut archive =
            Archive::planned_now(&s.archive_dir, &s.image_name, &s.image_tag, &s.archive_extension);
        info!(image = %s.image_ref(), archive = %archive.path.display(), "exporting image");

        let cmd = self.cli.save(&s.image_ref(), &archive.path);
        let output = self
            .runner
            .run(&cmd, s.export_timeout)
            .await?
            .into_result()?;
        debug!(output = %output.trim(), "export output");

        if !self.fs.is_file(&archive.path) {
            return Err(DockshipError::PostconditionViolation(format!(
                "export reported success but {} does not exist",
                archive.path.display()
            )));
        }

        match self.fs.file_size(&archive.path) {
            Ok(size) => archive.size = Some(size),
            Err(e) => warn!(error = %e, "failed to read archive size"),
        }
        info!(
            archive = %archive.path.display(),
            size = %archive.display_size(),
            "archive created"
        );
        Ok(archive)
    }

    async fn transfer(&self, archive: &Archive) -> Result<RemoteFile> {
        info!(
            archive = %archive.file_name(),
            destination = %self.remote.describe(),
            "uploading archive"
        );
        let remote = self.remote.push(&archive.path).await?;
        info!(remote = %remote.remote_path, bytes = remote.bytes, "archive uploaded");
        Ok(remote)
    }

    fn cleanup(&self, archive: &Archive) -> bool {
        info!(archive = %archive.path.display(), "removing local archive");
        match self.fs.remove_file(&archive.path) {
            Ok(()) => true,
            Err(e) => {
                warn!(archive = %archive.path.display(), error = %e, "failed to remove local archive");
                false
            }
        }
    }
}
