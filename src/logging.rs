// src/logging.rs

//! Logging setup for `dockship` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag
//! 2. `--verbose` (debug)
//! 3. `DOCKSHIP_LOG` environment variable (e.g. "info", "debug")
//! 4. `log_level` from the config file
//! 5. default to `info`

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "DOCKSHIP_LOG";

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(
    cli_level: Option<LogLevel>,
    verbose: bool,
    config_level: Option<&str>,
) -> Result<()> {
    let env_level = std::env::var(LOG_ENV_VAR).ok();
    let level = resolve_level(cli_level, verbose, env_level.as_deref(), config_level);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

/// Pick the effective level. Unparseable env/config values fall through to
/// the next source.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    verbose: bool,
    env_level: Option<&str>,
    config_level: Option<&str>,
) -> tracing::Level {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl);
    }
    if verbose {
        return tracing::Level::DEBUG;
    }
    env_level
        .and_then(parse_level_str)
        .or_else(|| config_level.and_then(parse_level_str))
        .unwrap_or(tracing::Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn flag_beats_everything() {
        assert_eq!(
            resolve_level(Some(LogLevel::Warn), true, Some("trace"), Some("debug")),
            Level::WARN
        );
    }

    #[test]
    fn verbose_beats_env_and_config() {
        assert_eq!(resolve_level(None, true, Some("error"), Some("error")), Level::DEBUG);
    }

    #[test]
    fn env_then_config_then_info() {
        assert_eq!(resolve_level(None, false, Some("warning"), Some("debug")), Level::WARN);
        assert_eq!(resolve_level(None, false, Some("loud"), Some("debug")), Level::DEBUG);
        assert_eq!(resolve_level(None, false, None, None), Level::INFO);
    }
}
