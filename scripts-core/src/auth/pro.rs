use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

use super::{
  AuthError, RequestAuthenticator, RequestParts, SignedHeaders, HEADER_CONTENT_TYPE, HEADER_KEY,
  HEADER_PASSPHRASE, HEADER_SIGN, HEADER_TIMESTAMP,
};
use crate::types::{redact_secret, since_epoch};

type HmacSha256 = Hmac<Sha256>;

/// Passphrase scheme used by the Coinbase Pro (Exchange) API.
///
/// The secret is base64 on the wire and decoded once at construction.
#[derive(Clone)]
pub struct ProAuth {
  api_key: String,
  passphrase: String,
  key: Vec<u8>,
}

impl std::fmt::Debug for ProAuth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProAuth")
      .field("api_key", &redact_secret(&self.api_key))
      .field("passphrase", &"<redacted>")
      .field("key", &"<redacted>")
      .finish()
  }
}

impl ProAuth {
  pub fn new(api_key: &str, secret_b64: &str, passphrase: &str) -> Result<Self, AuthError> {
    Ok(Self {
      api_key: api_key.to_string(),
      passphrase: passphrase.to_string(),
      key: decode_secret(secret_b64)?,
    })
  }

  /// Signs with a caller-chosen timestamp. The same string must be sent in
  /// `CB-ACCESS-TIMESTAMP`, so it is echoed back verbatim.
  pub fn sign_at(
    &self,
    timestamp: &str,
    request: &RequestParts<'_>,
  ) -> Result<SignedHeaders, AuthError> {
    let signature = sign_with_key(&self.key, timestamp, request)?;

    let mut headers = SignedHeaders::new();
    headers.push(HEADER_SIGN, signature);
    headers.push(HEADER_TIMESTAMP, timestamp.to_string());
    headers.push(HEADER_KEY, self.api_key.clone());
    headers.push(HEADER_PASSPHRASE, self.passphrase.clone());
    headers.push(HEADER_CONTENT_TYPE, "application/json".to_string());
    Ok(headers)
  }
}

impl RequestAuthenticator for ProAuth {
  fn sign(&self, request: &RequestParts<'_>) -> Result<SignedHeaders, AuthError> {
    let timestamp = timestamp_string(since_epoch());
    tracing::debug!(
      method = request.method,
      path = request.path,
      timestamp = %timestamp,
      "signing Coinbase Pro request"
    );
    self.sign_at(&timestamp, request)
  }
}

/// Base64 HMAC-SHA256 of `timestamp ++ method ++ path ++ body`, keyed with the
/// base64-decoded secret.
pub fn signature(
  secret_b64: &str,
  timestamp: &str,
  request: &RequestParts<'_>,
) -> Result<String, AuthError> {
  let key = decode_secret(secret_b64)?;
  sign_with_key(&key, timestamp, request)
}

/// Seconds since the epoch with microsecond precision, e.g. `1700000000.123456`.
pub fn timestamp_string(since_epoch: Duration) -> String {
  format!("{}.{:06}", since_epoch.as_secs(), since_epoch.subsec_micros())
}

fn decode_secret(secret_b64: &str) -> Result<Vec<u8>, AuthError> {
  Ok(STANDARD.decode(secret_b64.trim().as_bytes())?)
}

fn sign_with_key(
  key: &[u8],
  timestamp: &str,
  request: &RequestParts<'_>,
) -> Result<String, AuthError> {
  let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidKey)?;
  mac.update(timestamp.as_bytes());
  mac.update(request.method.as_bytes());
  mac.update(request.path.as_bytes());
  mac.update(request.body);
  Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
