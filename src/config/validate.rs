// src/config/validate.rs

use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile, UploaderSection, WatcherSection};
use crate::errors::{DockshipError, Result};
use crate::types::Mode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DockshipError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        normalize(&mut raw);
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Check the invariants for the configured mode.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global(cfg)?;
    match cfg.mode {
        Mode::Uploader => validate_uploader(&cfg.uploader),
        Mode::Watcher => validate_watcher(&cfg.watcher),
    }
}

fn validate_global(cfg: &RawConfigFile) -> Result<()> {
    if cfg.container_cli.trim().is_empty() {
        return Err(config_error("container_cli must not be empty"));
    }
    Ok(())
}

fn validate_uploader(up: &UploaderSection) -> Result<()> {
    require_path(&up.build_path, "[uploader].build_path")?;
    require(&up.image_name, "[uploader].image_name")?;
    require(&up.image_tag, "[uploader].image_tag")?;
    require(&up.remote_host, "[uploader].remote_host")?;
    require(&up.remote_user, "[uploader].remote_user")?;
    require_path(&up.remote_key_path, "[uploader].remote_key_path")?;
    require(&up.remote_upload_path, "[uploader].remote_upload_path")?;

    if up.remote_port == 0 {
        return Err(config_error("[uploader].remote_port must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_watcher(w: &WatcherSection) -> Result<()> {
    require_path(&w.watch_directory, "[watcher].watch_directory")?;
    require(&w.container_name, "[watcher].container_name")?;

    let ext = w.archive_extension.trim();
    if ext.len() < 2 || !ext.starts_with('.') {
        return Err(config_error(&format!(
            "[watcher].archive_extension must look like \".tar\" (got {:?})",
            w.archive_extension
        )));
    }
    if w.stability_poll.get().is_zero() {
        return Err(config_error("[watcher].stability_poll must be greater than zero"));
    }
    Ok(())
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(config_error(&format!("{field} is required")));
    }
    Ok(())
}

fn require_path(value: &Path, field: &str) -> Result<()> {
    if value.as_os_str().is_empty() {
        return Err(config_error(&format!("{field} is required")));
    }
    Ok(())
}

fn config_error(msg: &str) -> DockshipError {
    DockshipError::ConfigError(msg.to_string())
}

/// Expand `~` in paths and strip stray whitespace from values that are
/// matched literally later on.
fn normalize(cfg: &mut RawConfigFile) {
    let up = &mut cfg.uploader;
    up.build_path = expand_home(&up.build_path);
    up.archive_dir = expand_home(&up.archive_dir);
    up.remote_key_path = expand_home(&up.remote_key_path);
    up.known_hosts_path = up.known_hosts_path.as_deref().map(expand_home);
    cfg.watcher.watch_directory = expand_home(&cfg.watcher.watch_directory);
    cfg.watcher.archive_extension = cfg.watcher.archive_extension.trim().to_string();
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}
