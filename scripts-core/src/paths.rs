use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "OPS_SCRIPTS_HOME";

pub fn base_dir() -> anyhow::Result<PathBuf> {
  if let Ok(dir) = std::env::var(HOME_ENV) {
    if !dir.trim().is_empty() {
      return Ok(PathBuf::from(dir));
    }
  }
  let home = std::env::var("HOME")
    .map_err(|_| anyhow::anyhow!("neither {HOME_ENV} nor HOME is set"))?;
  Ok(PathBuf::from(home).join(".config").join("ops-scripts"))
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}
