pub mod auth;
pub mod coinbase;
pub mod config;
pub mod console;
pub mod credentials;
pub mod http;
pub mod logging;
pub mod paths;
pub mod pricing;
pub mod types;

use std::path::PathBuf;

pub const LOG_FILE_PREFIX: &str = "ops-scripts.log";

/// Used when neither `RUST_LOG` nor `[logging] level` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolves the config path: an explicit `--config` wins, otherwise
/// `config.toml` under the base directory.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
  match explicit {
    Some(p) => Ok(p),
    None => Ok(paths::config_path(&paths::base_dir()?)),
  }
}

pub fn run(cli: console::Cli) -> anyhow::Result<()> {
  let config_path = resolve_config_path(cli.config.clone())?;
  let cfg = config::load_or_create_default(&config_path)?;

  let log_dir = match config_path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => paths::logs_dir(dir),
    _ => paths::logs_dir(&paths::base_dir()?),
  };
  logging::init(&cfg.logging, DEFAULT_LOG_LEVEL, &log_dir, LOG_FILE_PREFIX)?;

  tracing::debug!(config = %config_path.display(), "configuration loaded");
  console::run_command(&cfg, cli.command)
}
