use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn now_unix_s() -> u64 {
  since_epoch().as_secs()
}

/// Wall-clock time as a duration since the Unix epoch; clocks set before 1970
/// read as zero.
pub fn since_epoch() -> Duration {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
}

/// Keeps only the first and last two characters of a secret for log output.
pub fn redact_secret(secret: &str) -> String {
  let count = secret.chars().count();
  if count <= 6 {
    return "<redacted>".to_string();
  }
  let head: String = secret.chars().take(2).collect();
  let tail: String = secret.chars().skip(count - 2).collect();
  format!("{head}...{tail}")
}

pub fn short_error(e: &anyhow::Error) -> String {
  let text = format!("{e:#}");
  let count = text.chars().count();
  if count <= 180 {
    return text;
  }
  let prefix: String = text.chars().take(180).collect();
  format!("{prefix}...")
}
