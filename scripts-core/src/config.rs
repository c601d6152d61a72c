use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub logging: LoggingConfig,
  pub http: HttpConfig,
  pub endpoints: EndpointsConfig,
  pub pricing: PricingConfig,
  pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  /// Unset means each tool's own default level.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub level: Option<String>,

  #[serde(default)]
  pub to_file: bool,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

fn default_retention_days() -> u64 {
  14
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: None,
      to_file: false,
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
  #[serde(default = "default_timeout_seconds")]
  pub timeout_seconds: u64,

  #[serde(default = "default_max_body_bytes")]
  pub max_body_bytes: usize,

  /// 0 disables redirects.
  #[serde(default = "default_max_redirects")]
  pub max_redirects: usize,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: default_timeout_seconds(),
      max_body_bytes: default_max_body_bytes(),
      max_redirects: default_max_redirects(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
  #[serde(default = "default_coinbase_api")]
  pub coinbase_api: String,

  #[serde(default = "default_coinbase_pro_api")]
  pub coinbase_pro_api: String,

  #[serde(default = "default_coinmarketcap_api")]
  pub coinmarketcap_api: String,
}

impl Default for EndpointsConfig {
  fn default() -> Self {
    Self {
      coinbase_api: default_coinbase_api(),
      coinbase_pro_api: default_coinbase_pro_api(),
      coinmarketcap_api: default_coinmarketcap_api(),
    }
  }
}

/// Coin symbol lists that pick a pricing source. Symbols are matched exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
  #[serde(default = "default_stable_symbols")]
  pub stable: Vec<String>,

  #[serde(default = "default_untracked_symbols")]
  pub untracked: Vec<String>,

  #[serde(default = "default_coinbase_symbols")]
  pub coinbase: Vec<String>,
}

impl Default for PricingConfig {
  fn default() -> Self {
    Self {
      stable: default_stable_symbols(),
      untracked: default_untracked_symbols(),
      coinbase: default_coinbase_symbols(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionPolicy {
  /// `@@||` rules populate the exception list.
  Record,
  /// `@@||` rules are logged and dropped.
  Discard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
  #[serde(default = "default_exception_policy")]
  pub exception_policy: ExceptionPolicy,

  #[serde(default = "default_variable_description")]
  pub variable_description: String,

  #[serde(default = "default_max_source_bytes")]
  pub max_source_bytes: usize,
}

impl Default for FilterConfig {
  fn default() -> Self {
    Self {
      exception_policy: default_exception_policy(),
      variable_description: default_variable_description(),
      max_source_bytes: default_max_source_bytes(),
    }
  }
}

fn default_timeout_seconds() -> u64 {
  60
}

fn default_max_body_bytes() -> usize {
  4 * 1024 * 1024
}

fn default_max_redirects() -> usize {
  5
}

fn default_coinbase_api() -> String {
  "https://api.coinbase.com/".to_string()
}

fn default_coinbase_pro_api() -> String {
  "https://api.pro.coinbase.com/".to_string()
}

fn default_coinmarketcap_api() -> String {
  "https://pro-api.coinmarketcap.com/".to_string()
}

fn default_stable_symbols() -> Vec<String> {
  ["DAI", "USDC", "GUSD"].iter().map(|s| s.to_string()).collect()
}

fn default_untracked_symbols() -> Vec<String> {
  ["robot", "citadao"].iter().map(|s| s.to_string()).collect()
}

fn default_coinbase_symbols() -> Vec<String> {
  [
    "BTC", "AERO", "ALGO", "DOGE", "XRP", "ADA", "ETH", "POL", "ALCX", "ENS",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

fn default_exception_policy() -> ExceptionPolicy {
  ExceptionPolicy::Record
}

fn default_variable_description() -> String {
  "ADD_A_DESCRIPTION".to_string()
}

fn default_max_source_bytes() -> usize {
  32 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub http: Option<HttpConfig>,

  #[serde(default)]
  pub endpoints: Option<EndpointsConfig>,

  #[serde(default)]
  pub pricing: Option<PricingConfig>,

  #[serde(default)]
  pub filter: Option<FilterConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(h) = self.http {
      cfg.http = h;
    }
    if let Some(e) = self.endpoints {
      cfg.endpoints = e;
    }
    if let Some(p) = self.pricing {
      cfg.pricing = p;
    }
    if let Some(f) = self.filter {
      cfg.filter = f;
    }

    if let Some(reason) = validate_http_config(&cfg.http) {
      tracing::warn!(reason = %reason, "http config invalid; using defaults");
      cfg.http = HttpConfig::default();
    }
    if let Some(reason) = validate_endpoints_config(&cfg.endpoints) {
      tracing::warn!(reason = %reason, "endpoints config invalid; using defaults");
      cfg.endpoints = EndpointsConfig::default();
    }
    if cfg.filter.max_source_bytes == 0 {
      tracing::warn!("filter.max_source_bytes must be > 0; using default");
      cfg.filter.max_source_bytes = default_max_source_bytes();
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.logging.is_none()
      || self.http.is_none()
      || self.endpoints.is_none()
      || self.pricing.is_none()
      || self.filter.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes && !parent.as_os_str().is_empty() {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
      tracing::info!(path = %path.display(), "wrote default config");
    } else {
      tracing::debug!(path = %path.display(), "config missing; using defaults");
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let upgrade = file.needs_upgrade();
      let cfg = file.normalize();
      if allow_writes && upgrade {
        upgrade_in_place(path, &cfg)?;
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = backup_path(path, "bad");
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "ops-scripts: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "ops-scripts: invalid config at {}; using defaults: {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

/// Backs up the current file and rewrites it with every section filled in.
/// Failures are logged; the loaded config stays usable either way.
fn upgrade_in_place(path: &Path, cfg: &Config) -> anyhow::Result<bool> {
  let backup = backup_path(path, "bak");
  if let Err(e) = fs::copy(path, &backup) {
    tracing::warn!(
      path = %path.display(),
      backup = %backup.display(),
      error = %e,
      "config backup failed; leaving file as is"
    );
    return Ok(false);
  }

  let contents = toml::to_string_pretty(&to_config_file(cfg))?;
  if let Err(e) = write_atomic(path, &contents) {
    tracing::warn!(path = %path.display(), error = %e, "writing upgraded config failed");
    return Ok(false);
  }

  tracing::info!(
    path = %path.display(),
    backup = %backup.display(),
    "upgraded config defaults written"
  );
  Ok(true)
}

fn backup_path(path: &Path, tag: &str) -> std::path::PathBuf {
  let ts = crate::types::now_unix_s();
  let name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "config.toml".to_string());
  path.with_file_name(format!("{name}.{tag}-{ts}"))
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    logging: Some(cfg.logging.clone()),
    http: Some(cfg.http.clone()),
    endpoints: Some(cfg.endpoints.clone()),
    pricing: Some(cfg.pricing.clone()),
    filter: Some(cfg.filter.clone()),
  }
}

/// Writes to a hidden sibling first so readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

fn validate_http_config(cfg: &HttpConfig) -> Option<String> {
  if cfg.timeout_seconds == 0 {
    return Some("timeout_seconds must be > 0".to_string());
  }
  if cfg.max_body_bytes == 0 {
    return Some("max_body_bytes must be > 0".to_string());
  }
  None
}

fn validate_endpoints_config(cfg: &EndpointsConfig) -> Option<String> {
  for endpoint in [
    &cfg.coinbase_api,
    &cfg.coinbase_pro_api,
    &cfg.coinmarketcap_api,
  ] {
    let Ok(url) = reqwest::Url::parse(endpoint) else {
      return Some(format!("invalid endpoint URL: {endpoint}"));
    };
    if url.scheme() != "https" {
      return Some(format!("endpoint must use HTTPS: {endpoint}"));
    }
    if url.host_str().is_none() {
      return Some(format!("endpoint has no host: {endpoint}"));
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let cfg = load_or_create_default(&path).unwrap();
    assert!(path.exists());
    assert_eq!(cfg.filter.exception_policy, ExceptionPolicy::Record);
    assert_eq!(cfg.http.timeout_seconds, 60);

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("[pricing]"));
    assert!(raw.contains("GUSD"));
  }

  #[test]
  fn readonly_load_never_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let cfg = load_or_default_readonly(&path).unwrap();
    assert!(!path.exists());
    assert_eq!(cfg.logging.level, None);
  }

  #[test]
  fn partial_file_keeps_given_sections_and_fills_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "[filter]\nexception_policy = \"discard\"\n\n[pricing]\nstable = [\"DAI\"]\n",
    )
    .unwrap();

    let cfg = load_or_default_readonly(&path).unwrap();
    assert_eq!(cfg.filter.exception_policy, ExceptionPolicy::Discard);
    assert_eq!(cfg.pricing.stable, vec!["DAI".to_string()]);
    assert_eq!(cfg.pricing.untracked, default_untracked_symbols());
    assert_eq!(cfg.endpoints.coinbase_api, "https://api.coinbase.com/");
  }

  #[test]
  fn plain_http_endpoint_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
      &path,
      "[endpoints]\ncoinbase_api = \"http://api.coinbase.com/\"\n",
    )
    .unwrap();

    let cfg = load_or_default_readonly(&path).unwrap();
    assert_eq!(cfg.endpoints.coinbase_api, "https://api.coinbase.com/");
  }

  #[test]
  fn invalid_file_is_backed_up_when_writable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "this is = = not toml").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.http.timeout_seconds, 60);

    let backups: Vec<_> = fs::read_dir(dir.path())
      .unwrap()
      .flatten()
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bad-"))
      .collect();
    assert_eq!(backups.len(), 1);
  }

  #[test]
  fn partial_file_is_upgraded_with_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[filter]\nexception_policy = \"discard\"\n").unwrap();

    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.filter.exception_policy, ExceptionPolicy::Discard);

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("[pricing]"));
    assert!(raw.contains("discard"));
    let backups = fs::read_dir(dir.path())
      .unwrap()
      .flatten()
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bak-"))
      .count();
    assert_eq!(backups, 1);
  }

  #[test]
  fn failed_upgrade_reports_nothing_written() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be copied, so the backup step fails.
    let not_a_file = dir.path().join("config.toml");
    fs::create_dir(&not_a_file).unwrap();

    let written = upgrade_in_place(&not_a_file, &Config::default()).unwrap();
    assert!(!written);
    assert!(not_a_file.is_dir());
  }
}
