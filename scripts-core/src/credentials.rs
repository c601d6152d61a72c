use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::{AuthError, ProAuth, WalletAuth};
use crate::types::redact_secret;

/// API key and secret for the Coinbase wallet API.
#[derive(Clone, Deserialize)]
pub struct WalletCredentials {
  #[serde(rename = "API_Key")]
  pub api_key: String,
  #[serde(rename = "API_Secret")]
  pub api_secret: String,
}

impl WalletCredentials {
  pub fn authenticator(&self) -> Result<WalletAuth, AuthError> {
    WalletAuth::new(&self.api_key, &self.api_secret)
  }
}

impl std::fmt::Debug for WalletCredentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WalletCredentials")
      .field("api_key", &redact_secret(&self.api_key))
      .field("api_secret", &"<redacted>")
      .finish()
  }
}

/// API key, base64 secret and passphrase for the Coinbase Pro API.
#[derive(Clone, Deserialize)]
pub struct ProCredentials {
  #[serde(rename = "API_Key")]
  pub api_key: String,
  #[serde(rename = "API_Secret")]
  pub api_secret: String,
  #[serde(rename = "Passphrase")]
  pub passphrase: String,
}

impl ProCredentials {
  pub fn authenticator(&self) -> Result<ProAuth, AuthError> {
    ProAuth::new(&self.api_key, &self.api_secret, &self.passphrase)
  }
}

impl std::fmt::Debug for ProCredentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProCredentials")
      .field("api_key", &redact_secret(&self.api_key))
      .field("api_secret", &"<redacted>")
      .field("passphrase", &"<redacted>")
      .finish()
  }
}

/// Source of API credentials. Callers hand a store to the commands instead of
/// the commands reading a fixed location.
pub trait CredentialStore {
  fn wallet(&self) -> anyhow::Result<WalletCredentials>;
  fn pro(&self) -> anyhow::Result<ProCredentials>;
}

/// Reads credentials from JSON files with `API_Key`, `API_Secret` and
/// (for Pro) `Passphrase` fields.
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore {
  pub wallet_path: Option<PathBuf>,
  pub pro_path: Option<PathBuf>,
}

impl JsonFileStore {
  pub fn with_wallet(path: impl Into<PathBuf>) -> Self {
    Self {
      wallet_path: Some(path.into()),
      pro_path: None,
    }
  }

  pub fn with_pro(path: impl Into<PathBuf>) -> Self {
    Self {
      wallet_path: None,
      pro_path: Some(path.into()),
    }
  }
}

impl CredentialStore for JsonFileStore {
  fn wallet(&self) -> anyhow::Result<WalletCredentials> {
    let path = self
      .wallet_path
      .as_deref()
      .ok_or_else(|| anyhow::anyhow!("no Coinbase credentials file configured"))?;
    read_json(path)
  }

  fn pro(&self) -> anyhow::Result<ProCredentials> {
    let path = self
      .pro_path
      .as_deref()
      .ok_or_else(|| anyhow::anyhow!("no Coinbase Pro credentials file configured"))?;
    read_json(path)
  }
}

/// Holds credentials that were obtained elsewhere, e.g. from the environment.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  pub wallet: Option<WalletCredentials>,
  pub pro: Option<ProCredentials>,
}

impl CredentialStore for MemoryStore {
  fn wallet(&self) -> anyhow::Result<WalletCredentials> {
    self
      .wallet
      .clone()
      .ok_or_else(|| anyhow::anyhow!("no Coinbase credentials held"))
  }

  fn pro(&self) -> anyhow::Result<ProCredentials> {
    self
      .pro
      .clone()
      .ok_or_else(|| anyhow::anyhow!("no Coinbase Pro credentials held"))
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
  let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
  let out = serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
  tracing::debug!(path = %path.display(), "loaded credentials file");
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_pro_credentials_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coinbase_pro.json");
    fs::write(
      &path,
      r#"{"API_Key":"k","API_Secret":"dGVzdHNlY3JldA==","Passphrase":"p"}"#,
    )
    .unwrap();

    let creds = JsonFileStore::with_pro(&path).pro().unwrap();
    assert_eq!(creds.api_key, "k");
    assert_eq!(creds.passphrase, "p");
    assert!(creds.authenticator().is_ok());
  }

  #[test]
  fn wallet_file_ignores_extra_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coinbase.json");
    fs::write(&path, r#"{"API_Key":"k","API_Secret":"s","Note":"x"}"#).unwrap();

    let creds = JsonFileStore::with_wallet(&path).wallet().unwrap();
    assert_eq!(creds.api_secret, "s");
  }

  #[test]
  fn missing_field_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coinbase_pro.json");
    fs::write(&path, r#"{"API_Key":"k","API_Secret":"s"}"#).unwrap();

    let err = JsonFileStore::with_pro(&path).pro().unwrap_err();
    assert!(format!("{err:#}").contains("coinbase_pro.json"));
  }

  #[test]
  fn unconfigured_store_errors() {
    assert!(JsonFileStore::default().wallet().is_err());
    assert!(MemoryStore::default().pro().is_err());
  }

  #[test]
  fn debug_redacts_secrets() {
    let creds = ProCredentials {
      api_key: "key-abcdef".to_string(),
      api_secret: "c2VjcmV0".to_string(),
      passphrase: "hunter2".to_string(),
    };
    let dbg = format!("{creds:?}");
    assert!(!dbg.contains("c2VjcmV0"));
    assert!(!dbg.contains("hunter2"));
  }
}
