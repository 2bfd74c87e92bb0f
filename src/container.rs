// src/container.rs

//! Command lines for the container runtime CLI.
//!
//! Only the command text is built here; the pipelines run it through a
//! `CommandRunner` and look at nothing but exit status and raw output.

use std::path::Path;

use crate::config::WatcherSection;
use crate::exec::shell_quote;

/// Everything `run` needs to start the managed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub restart_policy: String,
    pub ports: Vec<String>,
    pub env: Vec<String>,
    pub volumes: Vec<String>,
}

impl ContainerSpec {
    pub fn from_watcher(w: &WatcherSection) -> Self {
        Self {
            name: w.container_name.clone(),
            image: w.image_ref().to_string(),
            restart_policy: w.restart_policy.clone(),
            ports: w.container_ports.clone(),
            env: w.container_env.clone(),
            volumes: w.container_volumes.clone(),
        }
    }
}

/// Builds command lines for one container runtime binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCli {
    program: String,
}

impl ContainerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn build(&self, image: &str, context: &Path) -> String {
        format!(
            "{} build -t {} {}",
            self.program,
            shell_quote(image),
            quote_path(context)
        )
    }

    pub fn save(&self, image: &str, archive: &Path) -> String {
        format!(
            "{} save {} -o {}",
            self.program,
            shell_quote(image),
            quote_path(archive)
        )
    }

    pub fn load(&self, archive: &Path) -> String {
        format!("{} load -i {}", self.program, quote_path(archive))
    }

    pub fn stop(&self, name: &str) -> String {
        format!("{} stop {}", self.program, shell_quote(name))
    }

    pub fn remove(&self, name: &str) -> String {
        format!("{} rm {}", self.program, shell_quote(name))
    }

    /// `run -d --name N [--restart P] [-p ..] [-e ..] [-v ..] IMAGE`
    pub fn run(&self, spec: &ContainerSpec) -> String {
        let mut cmd = format!("{} run -d --name {}", self.program, shell_quote(&spec.name));

        if !spec.restart_policy.trim().is_empty() {
            cmd.push_str(&format!(" --restart {}", shell_quote(&spec.restart_policy)));
        }
        for port in &spec.ports {
            cmd.push_str(&format!(" -p {}", shell_quote(port)));
        }
        for env in &spec.env {
            cmd.push_str(&format!(" -e {}", shell_quote(env)));
        }
        for volume in &spec.volumes {
            cmd.push_str(&format!(" -v {}", shell_quote(volume)));
        }

        cmd.push(' ');
        cmd.push_str(&shell_quote(&spec.image));
        cmd
    }

    /// Status line of the container with exactly this name (empty output
    /// when it does not exist).
    pub fn status(&self, name: &str) -> String {
        format!(
            "{} ps -a --filter {} --format {}",
            self.program,
            shell_quote(&format!("name=^{name}$")),
            shell_quote("{{.Status}}")
        )
    }

    pub fn logs(&self, name: &str, lines: usize) -> String {
        format!("{} logs --tail {} {}", self.program, lines, shell_quote(name))
    }
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}
