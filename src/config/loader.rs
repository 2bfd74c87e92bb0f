// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DockshipError, Result};
use crate::types::Mode;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the per-mode checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        DockshipError::ConfigError(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file, apply an optional mode override, and validate.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    load_with_mode(path, None)
}

/// Like [`load_and_validate`], but `mode` (from `--mode`) replaces the
/// configured mode before validation.
pub fn load_with_mode(path: impl AsRef<Path>, mode: Option<Mode>) -> Result<ConfigFile> {
    let mut raw = load_from_path(&path)?;
    if let Some(mode) = mode {
        raw.mode = mode;
    }
    ConfigFile::try_from(raw)
}

/// A filled-in example configuration for `dockship init`.
pub fn sample_config() -> RawConfigFile {
    let mut cfg = RawConfigFile::default();

    let up = &mut cfg.uploader;
    up.build_path = PathBuf::from("./");
    up.image_name = "myapp".to_string();
    up.archive_dir = PathBuf::from("./tarballs");
    up.remote_host = "destination.server.com".to_string();
    up.remote_user = "deploy".to_string();
    up.remote_key_path = PathBuf::from("~/.ssh/id_rsa");
    up.remote_upload_path = "/opt/docker-uploads".to_string();
    up.pre_build_commands = vec!["echo 'Starting build process...'".to_string()];
    up.post_build_commands = vec!["echo 'Build process completed.'".to_string()];

    let w = &mut cfg.watcher;
    w.watch_directory = PathBuf::from("/opt/docker-uploads");
    w.container_name = "myapp".to_string();
    w.container_ports = vec!["8080:8080".to_string()];
    w.container_env = vec!["NODE_ENV=production".to_string()];
    w.pre_load_commands = vec!["echo 'Preparing to load new image...'".to_string()];
    w.post_load_commands = vec!["echo 'New container deployed successfully.'".to_string()];

    cfg
}

/// Write [`sample_config`] to `path`, refusing to clobber an existing file
/// unless `force` is set.
pub fn write_sample_config(path: impl AsRef<Path>, force: bool) -> Result<()> {
    let path = path.as_ref();
    if path.exists() && !force {
        return Err(DockshipError::ConfigError(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let text = toml::to_string_pretty(&sample_config())?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;

    info!(path = %path.display(), "wrote sample configuration");
    Ok(())
}
