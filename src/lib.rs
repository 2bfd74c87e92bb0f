// src/lib.rs

pub mod archive;
pub mod cli;
pub mod config;
pub mod container;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod reconcile;
pub mod supervisor;
pub mod transport;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_with_mode, write_sample_config};
use crate::container::ContainerCli;
use crate::errors::{DockshipError, Result};
use crate::exec::{CommandRunner, ShellRunner};
use crate::fs::RealFileSystem;
use crate::pipeline::{TransferPipeline, TransferSettings};
use crate::reconcile::{DeploySettings, Deployer, Quiescence, ReconcileLoop};
use crate::transport::SshRemoteCopy;
use crate::types::Mode;
use crate::watch::ArchiveEvent;

/// Capacity of the channel between the directory watcher and the loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);

    match args.command {
        Command::Init { force } => {
            write_sample_config(&config_path, force)?;
            println!("Sample configuration written to {}", config_path.display());
            Ok(())
        }
        Command::Run { mode } => {
            let cfg = load_with_mode(&config_path, mode)?;
            match cfg.mode {
                Mode::Uploader => run_uploader(&cfg).await,
                Mode::Watcher => run_watcher(&cfg).await,
            }
        }
        Command::Upload => run_uploader(&load_with_mode(&config_path, Some(Mode::Uploader))?).await,
        Command::Watch => run_watcher(&load_with_mode(&config_path, Some(Mode::Watcher))?).await,
        Command::Status => {
            let cfg = load_with_mode(&config_path, Some(Mode::Watcher))?;
            let deployer = build_deployer(&cfg, ShellRunner);
            println!("{}", status_line(deployer.container_name(), &deployer.status().await?));
            Ok(())
        }
        Command::Logs { lines } => {
            let cfg = load_with_mode(&config_path, Some(Mode::Watcher))?;
            let deployer = build_deployer(&cfg, ShellRunner);
            print!("{}", deployer.logs(lines).await?);
            Ok(())
        }
    }
}

/// The line printed by `dockship status`.
pub fn status_line(container: &str, status: &str) -> String {
    if status.is_empty() {
        format!("Container '{container}' not found")
    } else {
        format!("Container '{container}' status: {status}")
    }
}

/// Config log level for logging setup, if the file can be read at all.
///
/// Errors are left for the command itself to report.
pub fn peek_log_level(args: &CliArgs) -> Option<String> {
    if matches!(args.command, Command::Init { .. }) {
        return None;
    }
    config::load_from_path(Path::new(&args.config))
        .ok()
        .map(|raw| raw.log_level)
}

pub fn build_deployer<R: CommandRunner>(cfg: &ConfigFile, runner: R) -> Deployer<R> {
    Deployer::new(
        runner,
        Arc::new(RealFileSystem),
        ContainerCli::new(cfg.container_cli.clone()),
        DeploySettings::from_config(cfg),
    )
}

async fn run_uploader(cfg: &ConfigFile) -> Result<()> {
    let remote = SshRemoteCopy::from_config(&cfg.uploader, &cfg.timeouts);
    let pipeline = TransferPipeline::new(
        ShellRunner,
        remote,
        Arc::new(RealFileSystem),
        ContainerCli::new(cfg.container_cli.clone()),
        TransferSettings::from_config(cfg),
    );

    let report = tokio::select! {
        report = pipeline.run() => report?,
        _ = supervisor::shutdown_signal() => {
            return Err(DockshipError::Other(anyhow!("interrupted before the upload finished")));
        }
    };

    info!(
        remote = %report.remote.remote_path,
        size = %report.archive.display_size(),
        "upload complete"
    );
    if !report.cleaned_up {
        debug!(archive = %report.archive.path.display(), "local archive was left behind");
    }
    Ok(())
}

async fn run_watcher(cfg: &ConfigFile) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel::<ArchiveEvent>(EVENT_CHANNEL_CAPACITY);
    let watcher = watch::spawn_watcher(&cfg.watcher.watch_directory, events_tx)?;
    info!(dir = %watcher.directory().display(), "watching for archives");

    let (reconcile, handle) = ReconcileLoop::new(
        build_deployer(cfg, ShellRunner),
        events_rx,
        cfg.watcher.archive_extension.clone(),
        Quiescence::from_config(cfg),
    );
    let reconcile = reconcile.with_watcher(watcher);

    let summary = supervisor::supervise(reconcile, handle).await?;
    info!(
        deployed = summary.deployed,
        aborted = summary.aborted,
        skipped = summary.skipped,
        deferred = summary.deferred,
        "watcher stopped"
    );
    Ok(())
}
