#![allow(dead_code)]

use std::path::Path;

use dockship::config::{ConfigFile, RawConfigFile};
use dockship::types::{HumanDuration, Mode};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from a valid config for the chosen mode with short debounce
/// settings so loop tests stay fast.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    /// Watcher config for container `name` watching `dir`.
    pub fn watcher(dir: impl AsRef<Path>, name: &str) -> Self {
        let mut config = RawConfigFile::default();
        config.mode = Mode::Watcher;
        config.watcher.watch_directory = dir.as_ref().to_path_buf();
        config.watcher.container_name = name.to_string();
        config.watcher.debounce = HumanDuration::from_millis(20);
        config.watcher.stability_poll = HumanDuration::from_millis(10);
        config.watcher.stability_max_polls = 5;
        Self { config }
    }

    /// Uploader config for image `name` writing archives into `archive_dir`.
    pub fn uploader(archive_dir: impl AsRef<Path>, name: &str) -> Self {
        let mut config = RawConfigFile::default();
        config.mode = Mode::Uploader;
        let up = &mut config.uploader;
        up.build_path = "./".into();
        up.image_name = name.to_string();
        up.archive_dir = archive_dir.as_ref().to_path_buf();
        up.remote_host = "deploy.test".to_string();
        up.remote_user = "deploy".to_string();
        up.remote_key_path = "/keys/id_ed25519".into();
        up.remote_upload_path = "/opt/uploads".to_string();
        Self { config }
    }

    pub fn with_port(mut self, mapping: &str) -> Self {
        self.config.watcher.container_ports.push(mapping.to_string());
        self
    }

    pub fn with_env(mut self, var: &str) -> Self {
        self.config.watcher.container_env.push(var.to_string());
        self
    }

    pub fn with_restart_policy(mut self, policy: &str) -> Self {
        self.config.watcher.restart_policy = policy.to_string();
        self
    }

    pub fn with_pre_load(mut self, cmd: &str) -> Self {
        self.config.watcher.pre_load_commands.push(cmd.to_string());
        self
    }

    pub fn with_post_load(mut self, cmd: &str) -> Self {
        self.config.watcher.post_load_commands.push(cmd.to_string());
        self
    }

    pub fn with_pre_build(mut self, cmd: &str) -> Self {
        self.config.uploader.pre_build_commands.push(cmd.to_string());
        self
    }

    pub fn with_post_build(mut self, cmd: &str) -> Self {
        self.config.uploader.post_build_commands.push(cmd.to_string());
        self
    }

    pub fn with_debounce_ms(mut self, millis: u64) -> Self {
        self.config.watcher.debounce = HumanDuration::from_millis(millis);
        self
    }

    pub fn with_archive_extension(mut self, ext: &str) -> Self {
        self.config.watcher.archive_extension = ext.to_string();
        self
    }

    pub fn with_max_polls(mut self, polls: u32) -> Self {
        self.config.watcher.stability_max_polls = polls;
        self
    }

    pub fn with_container_cli(mut self, program: &str) -> Self {
        self.config.container_cli = program.to_string();
        self
    }

    pub fn raw(&self) -> &RawConfigFile {
        &self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
