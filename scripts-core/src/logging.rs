use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber: stderr always, plus a daily rolling file
/// under `log_dir` when `cfg.to_file` is set. `RUST_LOG` overrides the
/// configured level, which in turn overrides `default_level`.
pub fn init(
  cfg: &LoggingConfig,
  default_level: &str,
  log_dir: &Path,
  file_prefix: &str,
) -> anyhow::Result<()> {
  let level = effective_level(cfg, default_level);
  if cfg.to_file {
    init_file_and_stderr(log_dir, file_prefix, level, cfg.retention_days)
  } else {
    init_stderr(level);
    Ok(())
  }
}

pub fn effective_level<'a>(cfg: &'a LoggingConfig, default_level: &'a str) -> &'a str {
  cfg.level.as_deref().unwrap_or(default_level)
}

pub fn init_stderr(level: &str) {
  let filter = env_filter(level);
  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(false);

  let _ = tracing_subscriber::registry()
    .with(filter)
    .with(stderr_layer)
    .try_init();
}

pub fn init_file_and_stderr(
  log_dir: &Path,
  file_prefix: &str,
  level: &str,
  retention_days: u64,
) -> anyhow::Result<()> {
  fs::create_dir_all(log_dir)?;
  cleanup_old_logs(log_dir, file_prefix, retention_days)?;

  let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
  let _ = FILE_GUARD.set(guard);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(file_writer)
    .with_target(true);

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(std::io::stderr)
    .with_target(false);

  let _ = tracing_subscriber::registry()
    .with(env_filter(level))
    .with(file_layer)
    .with(stderr_layer)
    .try_init();

  Ok(())
}

fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
  tracing_subscriber::EnvFilter::try_from_default_env()
    .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn cleanup_old_logs(log_dir: &Path, file_prefix: &str, retention_days: u64) -> anyhow::Result<()> {
  if retention_days == 0 {
    return Ok(());
  }

  let cutoff = SystemTime::now()
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let entries = match fs::read_dir(log_dir) {
    Ok(e) => e,
    Err(_) => return Ok(()),
  };

  for entry in entries.flatten() {
    let path: PathBuf = entry.path();
    if !is_tool_log_file(&path, file_prefix) {
      continue;
    }

    let modified = match entry.metadata().and_then(|m| m.modified()) {
      Ok(t) => t,
      Err(_) => continue,
    };

    if modified < cutoff {
      let _ = fs::remove_file(&path);
    }
  }

  Ok(())
}

fn is_tool_log_file(path: &Path, file_prefix: &str) -> bool {
  let name = match path.file_name().and_then(|n| n.to_str()) {
    Some(n) => n,
    None => return false,
  };

  name == file_prefix || name.starts_with(&format!("{file_prefix}."))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_prefixed_files_count_as_tool_logs() {
    assert!(is_tool_log_file(Path::new("/l/ops-scripts.log"), "ops-scripts.log"));
    assert!(is_tool_log_file(
      Path::new("/l/ops-scripts.log.2026-10-01"),
      "ops-scripts.log"
    ));
    assert!(!is_tool_log_file(Path::new("/l/other.log"), "ops-scripts.log"));
    assert!(!is_tool_log_file(Path::new("/l/ops-scripts.logger"), "ops-scripts.log"));
  }

  #[test]
  fn configured_level_beats_tool_default() {
    let mut cfg = LoggingConfig::default();
    assert_eq!(effective_level(&cfg, "warn"), "warn");

    cfg.level = Some("debug".to_string());
    assert_eq!(effective_level(&cfg, "warn"), "debug");
  }

  #[test]
  fn zero_retention_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("ops-scripts.log.2020-01-01");
    fs::write(&p, "old").unwrap();
    cleanup_old_logs(dir.path(), "ops-scripts.log", 0).unwrap();
    assert!(p.exists());
  }
}
