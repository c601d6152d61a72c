//! Converts a DNS filter list (ad-block rules, bare domains or hosts-file
//! lines) into Terraform `list(string)` variables.

pub mod error;
pub mod rules;
pub mod source;
pub mod terraform;

use clap::Parser;
use scripts_core::config::{self, Config, LoggingConfig};
use scripts_core::{logging, paths};
use std::path::{Path, PathBuf};

pub use error::FilterError;
pub use rules::{ParseStats, ParsedFilterSet};

pub const LOG_FILE_PREFIX: &str = "dns-to-terraform.log";

/// Used when neither `--log-level`, `RUST_LOG` nor `[logging] level` is set.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser, Debug)]
#[command(
  name = "dns-to-terraform",
  version,
  about = "Convert a DNS filter list into Terraform variables"
)]
pub struct Cli {
  /// Local path or http(s) URL of the filter list
  #[arg(short = 'a', long = "filter-list")]
  pub filter_list: String,

  /// Output file
  #[arg(short = 't', long = "terraform-file", default_value = "./list.tf")]
  pub terraform_file: PathBuf,

  /// Path to config.toml (defaults to the ops-scripts home directory)
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// Log level; overrides `[logging] level` from the config file
  #[arg(long)]
  pub log_level: Option<String>,
}

/// Parses `source` once and writes the variables file. Nothing is written
/// when the source cannot be read or fetched.
pub fn convert(
  source: &str,
  output: &Path,
  cfg: &Config,
  fetcher: &dyn source::SourceFetcher,
) -> anyhow::Result<ParseStats> {
  let (set, stats) = source::parse_source(source, fetcher, cfg.filter.exception_policy)?;
  tracing::info!(
    lines = stats.lines,
    block_rules = stats.block_rules,
    exception_rules = stats.exception_rules,
    rejected = stats.rejected,
    ignored = stats.ignored,
    "filter list parsed"
  );
  terraform::write(output, &set, &cfg.filter.variable_description)?;
  Ok(stats)
}

/// The config file's logging section with the command-line level applied.
fn logging_config(cfg: &Config, level_flag: Option<&str>) -> LoggingConfig {
  let mut log_cfg = cfg.logging.clone();
  if let Some(level) = level_flag {
    log_cfg.level = Some(level.to_string());
  }
  log_cfg
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
  let config_path = scripts_core::resolve_config_path(cli.config.clone())?;
  let cfg = config::load_or_default_readonly(&config_path)?;

  let log_cfg = logging_config(&cfg, cli.log_level.as_deref());
  let log_dir = match config_path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => paths::logs_dir(dir),
    _ => paths::logs_dir(&paths::base_dir()?),
  };
  logging::init(&log_cfg, DEFAULT_LOG_LEVEL, &log_dir, LOG_FILE_PREFIX)?;

  let fetcher = source::HttpFetcher::new(&cfg.http, cfg.filter.max_source_bytes)?;
  convert(&cli.filter_list, &cli.terraform_file, &cfg, &fetcher)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use scripts_core::config::ExceptionPolicy;
  use std::fs;

  struct FailingFetcher;

  impl source::SourceFetcher for FailingFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FilterError> {
      Err(FilterError::FetchFailed {
        url: url.to_string(),
        reason: "unexpected HTTP status 503".to_string(),
      })
    }
  }

  #[test]
  fn cli_defaults_output_path() {
    let cli = Cli::try_parse_from(["dns-to-terraform", "-a", "list.txt"]).unwrap();
    assert_eq!(cli.terraform_file, PathBuf::from("./list.tf"));
    assert_eq!(cli.log_level, None);
  }

  #[test]
  fn config_log_level_applies_without_flag() {
    let mut cfg = Config::default();
    cfg.logging.level = Some("info".to_string());

    let log_cfg = logging_config(&cfg, None);
    assert_eq!(logging::effective_level(&log_cfg, DEFAULT_LOG_LEVEL), "info");

    let log_cfg = logging_config(&cfg, Some("debug"));
    assert_eq!(logging::effective_level(&log_cfg, DEFAULT_LOG_LEVEL), "debug");

    let log_cfg = logging_config(&Config::default(), None);
    assert_eq!(logging::effective_level(&log_cfg, DEFAULT_LOG_LEVEL), "warn");
  }

  #[test]
  fn cli_requires_filter_list() {
    assert!(Cli::try_parse_from(["dns-to-terraform", "-t", "out.tf"]).is_err());
  }

  #[test]
  fn converts_local_list() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("filters.txt");
    let output = dir.path().join("list.tf");
    fs::write(
      &input,
      "! comment\n||b.example.com^\na.example.com\n@@||ok.example.com^\n||*.w.com^\n",
    )
    .unwrap();

    let cfg = Config::default();
    let stats = convert(input.to_str().unwrap(), &output, &cfg, &FailingFetcher).unwrap();
    assert_eq!(stats.block_rules, 2);

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("  \"a.example.com\",\n  \"b.example.com\",\n"));
    assert!(text.contains("variable \"exception_list\""));
    assert!(text.contains("description = \"ADD_A_DESCRIPTION\""));
    assert!(!text.contains("w.com"));
  }

  #[test]
  fn discard_policy_omits_exception_variable() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("filters.txt");
    let output = dir.path().join("list.tf");
    fs::write(&input, "@@||ok.example.com^\n").unwrap();

    let mut cfg = Config::default();
    cfg.filter.exception_policy = ExceptionPolicy::Discard;
    convert(input.to_str().unwrap(), &output, &cfg, &FailingFetcher).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(!text.contains("exception_list"));
    assert!(!text.contains("ok.example.com"));
  }

  #[test]
  fn failed_fetch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("list.tf");

    let err = convert(
      "https://lists.example.com/dns.txt",
      &output,
      &Config::default(),
      &FailingFetcher,
    )
    .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<FilterError>(),
      Some(FilterError::FetchFailed { .. })
    ));
    assert!(!output.exists());
  }

  #[test]
  fn unreadable_source_keeps_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("list.tf");
    fs::write(&output, "previous").unwrap();

    let missing = dir.path().join("missing.txt");
    let err = convert(
      missing.to_str().unwrap(),
      &output,
      &Config::default(),
      &FailingFetcher,
    )
    .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<FilterError>(),
      Some(FilterError::SourceUnreadable { .. })
    ));
    assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
  }
}
