// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{HumanDuration, Mode};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// mode = "watcher"
/// log_level = "info"
/// container_cli = "docker"
///
/// [uploader]
/// build_path = "./"
/// image_name = "myapp"
/// remote_host = "deploy.example.com"
/// remote_user = "deploy"
/// remote_key_path = "~/.ssh/id_ed25519"
/// remote_upload_path = "/opt/docker-uploads"
///
/// [watcher]
/// watch_directory = "/opt/docker-uploads"
/// container_name = "myapp"
/// container_ports = ["8080:8080"]
/// ```
///
/// Only the section matching `mode` has required fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub mode: Mode,

    /// `error`, `warn`, `info`, `debug` or `trace`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Container runtime binary (`docker`, `podman`, ...).
    #[serde(default = "default_container_cli")]
    pub container_cli: String,

    #[serde(default)]
    pub uploader: UploaderSection,

    #[serde(default)]
    pub watcher: WatcherSection,

    #[serde(default)]
    pub timeouts: TimeoutsSection,
}

/// Validated configuration.
///
/// Same shape as [`RawConfigFile`], but the required fields for `mode` are
/// present and `~` in paths has been expanded.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub mode: Mode,
    pub log_level: String,
    pub container_cli: String,
    pub uploader: UploaderSection,
    pub watcher: WatcherSection,
    pub timeouts: TimeoutsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            mode: raw.mode,
            log_level: raw.log_level,
            container_cli: raw.container_cli,
            uploader: raw.uploader,
            watcher: raw.watcher,
            timeouts: raw.timeouts,
        }
    }
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            log_level: default_log_level(),
            container_cli: default_container_cli(),
            uploader: UploaderSection::default(),
            watcher: WatcherSection::default(),
            timeouts: TimeoutsSection::default(),
        }
    }
}

/// `[uploader]` section: the build host side.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploaderSection {
    /// Build context handed to the default build command.
    #[serde(default)]
    pub build_path: PathBuf,

    #[serde(default)]
    pub image_name: String,

    #[serde(default = "default_image_tag")]
    pub image_tag: String,

    /// Where archives are written before upload. Empty means the current
    /// directory.
    #[serde(default)]
    pub archive_dir: PathBuf,

    /// Replaces the default `<cli> build -t name:tag <build_path>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,

    #[serde(default)]
    pub remote_host: String,

    #[serde(default = "default_remote_port")]
    pub remote_port: u16,

    #[serde(default)]
    pub remote_user: String,

    /// Private key used to authenticate the session.
    #[serde(default)]
    pub remote_key_path: PathBuf,

    /// Trust store for host identity; defaults to `~/.ssh/known_hosts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_path: Option<PathBuf>,

    /// Accept any host key when no trust store exists.
    #[serde(default)]
    pub insecure_skip_host_key_check: bool,

    /// Remote directory the archive is copied into.
    #[serde(default)]
    pub remote_upload_path: String,

    #[serde(default)]
    pub pre_build_commands: Vec<String>,

    #[serde(default)]
    pub post_build_commands: Vec<String>,
}

impl Default for UploaderSection {
    fn default() -> Self {
        Self {
            build_path: PathBuf::new(),
            image_name: String::new(),
            image_tag: default_image_tag(),
            archive_dir: PathBuf::new(),
            build_command: None,
            remote_host: String::new(),
            remote_port: default_remote_port(),
            remote_user: String::new(),
            remote_key_path: PathBuf::new(),
            known_hosts_path: None,
            insecure_skip_host_key_check: false,
            remote_upload_path: String::new(),
            pre_build_commands: Vec::new(),
            post_build_commands: Vec::new(),
        }
    }
}

/// `[watcher]` section: the deploy host side.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherSection {
    #[serde(default)]
    pub watch_directory: PathBuf,

    #[serde(default)]
    pub container_name: String,

    /// Image reference passed to `run`. When unset the container name is
    /// used as the image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Only files ending with this suffix are picked up.
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,

    #[serde(default)]
    pub container_ports: Vec<String>,

    #[serde(default)]
    pub container_env: Vec<String>,

    #[serde(default)]
    pub container_volumes: Vec<String>,

    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,

    #[serde(default)]
    pub pre_load_commands: Vec<String>,

    #[serde(default)]
    pub post_load_commands: Vec<String>,

    /// Quiet period after an event before the archive is touched.
    #[serde(default = "default_debounce")]
    pub debounce: HumanDuration,

    /// Interval between size checks once the quiet period is over.
    #[serde(default = "default_stability_poll")]
    pub stability_poll: HumanDuration,

    /// Give up waiting for a stable size after this many checks and
    /// process the archive anyway.
    #[serde(default = "default_stability_max_polls")]
    pub stability_max_polls: u32,
}

impl WatcherSection {
    /// Image reference for `run`.
    pub fn image_ref(&self) -> &str {
        self.image
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.container_name)
    }
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            watch_directory: PathBuf::new(),
            container_name: String::new(),
            image: None,
            archive_extension: default_archive_extension(),
            container_ports: Vec::new(),
            container_env: Vec::new(),
            container_volumes: Vec::new(),
            restart_policy: default_restart_policy(),
            pre_load_commands: Vec::new(),
            post_load_commands: Vec::new(),
            debounce: default_debounce(),
            stability_poll: default_stability_poll(),
            stability_max_polls: default_stability_max_polls(),
        }
    }
}

/// `[timeouts]` section: per-step budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutsSection {
    /// Applies to each hook command individually.
    #[serde(default = "default_hook_timeout")]
    pub hook: HumanDuration,
    #[serde(default = "default_build_timeout")]
    pub build: HumanDuration,
    #[serde(default = "default_export_timeout")]
    pub export: HumanDuration,
    #[serde(default = "default_connect_timeout")]
    pub connect: HumanDuration,
    #[serde(default = "default_transfer_timeout")]
    pub transfer: HumanDuration,
    #[serde(default = "default_load_timeout")]
    pub load: HumanDuration,
    /// Applies to `stop` and `rm` separately.
    #[serde(default = "default_stop_timeout")]
    pub stop: HumanDuration,
    #[serde(default = "default_run_timeout")]
    pub run: HumanDuration,
    #[serde(default = "default_status_timeout")]
    pub status: HumanDuration,
    #[serde(default = "default_logs_timeout")]
    pub logs: HumanDuration,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            hook: default_hook_timeout(),
            build: default_build_timeout(),
            export: default_export_timeout(),
            connect: default_connect_timeout(),
            transfer: default_transfer_timeout(),
            load: default_load_timeout(),
            stop: default_stop_timeout(),
            run: default_run_timeout(),
            status: default_status_timeout(),
            logs: default_logs_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_container_cli() -> String {
    "docker".to_string()
}

fn default_image_tag() -> String {
    "latest".to_string()
}

fn default_remote_port() -> u16 {
    22
}

fn default_archive_extension() -> String {
    ".tar".to_string()
}

fn default_restart_policy() -> String {
    "unless-stopped".to_string()
}

fn default_debounce() -> HumanDuration {
    HumanDuration::from_secs(2)
}

fn default_stability_poll() -> HumanDuration {
    HumanDuration::from_millis(500)
}

fn default_stability_max_polls() -> u32 {
    20
}

fn default_hook_timeout() -> HumanDuration {
    HumanDuration::from_secs(5 * 60)
}

fn default_build_timeout() -> HumanDuration {
    HumanDuration::from_secs(15 * 60)
}

fn default_export_timeout() -> HumanDuration {
    HumanDuration::from_secs(10 * 60)
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_transfer_timeout() -> HumanDuration {
    HumanDuration::from_secs(30 * 60)
}

fn default_load_timeout() -> HumanDuration {
    HumanDuration::from_secs(10 * 60)
}

fn default_stop_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_run_timeout() -> HumanDuration {
    HumanDuration::from_secs(2 * 60)
}

fn default_status_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_logs_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}
