use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{
  AuthError, RequestAuthenticator, RequestParts, SignedHeaders, HEADER_KEY, HEADER_SIGN,
  HEADER_TIMESTAMP,
};
use crate::types::{now_unix_s, redact_secret};

type HmacSha256 = Hmac<Sha256>;

/// Key/secret scheme used by the Coinbase wallet (v2) API.
///
/// Key and message are fed to HMAC as ISO-8859-1 bytes, one byte per
/// character, never UTF-8.
#[derive(Clone)]
pub struct WalletAuth {
  api_key: String,
  key: Vec<u8>,
}

impl std::fmt::Debug for WalletAuth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WalletAuth")
      .field("api_key", &redact_secret(&self.api_key))
      .field("key", &"<redacted>")
      .finish()
  }
}

impl WalletAuth {
  pub fn new(api_key: &str, secret: &str) -> Result<Self, AuthError> {
    Ok(Self {
      api_key: api_key.to_string(),
      key: latin1_bytes("secret", secret)?,
    })
  }

  pub fn sign_at(
    &self,
    timestamp: u64,
    method: &str,
    path: &str,
    body: Option<&str>,
  ) -> Result<SignedHeaders, AuthError> {
    let timestamp = timestamp.to_string();
    let signature = sign_with_key(&self.key, &timestamp, method, path, body)?;

    let mut headers = SignedHeaders::new();
    headers.push(HEADER_SIGN, signature);
    headers.push(HEADER_TIMESTAMP, timestamp);
    headers.push(HEADER_KEY, self.api_key.clone());
    Ok(headers)
  }
}

impl RequestAuthenticator for WalletAuth {
  fn sign(&self, request: &RequestParts<'_>) -> Result<SignedHeaders, AuthError> {
    let body = std::str::from_utf8(request.body).map_err(|e| AuthError::EncodingError {
      field: "body",
      position: e.valid_up_to(),
    })?;
    let body = if body.is_empty() { None } else { Some(body) };
    tracing::debug!(
      method = request.method,
      path = request.path,
      "signing Coinbase wallet request"
    );
    self.sign_at(now_unix_s(), request.method, request.path, body)
  }
}

/// Lowercase hex HMAC-SHA256 of `timestamp ++ method ++ path ++ body` with
/// both key and message encoded as ISO-8859-1.
pub fn signature(
  secret: &str,
  timestamp: u64,
  method: &str,
  path: &str,
  body: Option<&str>,
) -> Result<String, AuthError> {
  let key = latin1_bytes("secret", secret)?;
  sign_with_key(&key, &timestamp.to_string(), method, path, body)
}

/// Encodes `text` one byte per character. Characters above U+00FF have no
/// ISO-8859-1 form and are rejected with their character position.
pub fn latin1_bytes(field: &'static str, text: &str) -> Result<Vec<u8>, AuthError> {
  text
    .chars()
    .enumerate()
    .map(|(position, c)| {
      u8::try_from(u32::from(c)).map_err(|_| AuthError::EncodingError { field, position })
    })
    .collect()
}

fn sign_with_key(
  key: &[u8],
  timestamp: &str,
  method: &str,
  path: &str,
  body: Option<&str>,
) -> Result<String, AuthError> {
  let message = format!("{timestamp}{method}{path}{}", body.unwrap_or(""));
  let message = latin1_bytes("message", &message)?;

  let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidKey)?;
  mac.update(&message);
  Ok(format!("{:x}", mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matches_reference_vector() {
    let sig = signature("testsecret", 1_700_000_000, "GET", "/v2/prices/BTC-USD/spot", None).unwrap();
    assert_eq!(
      sig,
      "eab6cdae655d3ea1929e3e3298a076482a47d636054280edba286761374c3394"
    );
  }

  #[test]
  fn non_ascii_secret_is_encoded_one_byte_per_char() {
    let sig = signature("s\u{e9}cret", 1_700_000_000, "GET", "/v2/user", None).unwrap();
    assert_eq!(
      sig,
      "f1f7ed0f98a56400c9f7170b9a54a6039ca9ca4fb011e36c2f02ad51fc6cb9e4"
    );
    // The UTF-8 keyed digest differs and would be rejected by the server.
    assert_ne!(
      sig,
      "3fb1d32ccef0c001932cdf64f9422f6481234ade9be1743caf63eddb75839fe9"
    );
  }

  #[test]
  fn non_ascii_body_is_encoded_one_byte_per_char() {
    let sig = signature(
      "testsecret",
      1_700_000_000,
      "POST",
      "/v2/accounts",
      Some("{\"name\":\"caf\u{e9}\"}"),
    )
    .unwrap();
    assert_eq!(
      sig,
      "be2907b5f111a2c01cb0314b1b51f7242c7dcdbee3daedab326ba1c5e5ce75a9"
    );
  }

  #[test]
  fn absent_and_empty_body_sign_the_same() {
    let a = signature("k", 1, "GET", "/v2/user", None).unwrap();
    let b = signature("k", 1, "GET", "/v2/user", Some("")).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn header_set_has_three_entries() {
    let auth = WalletAuth::new("key-1", "testsecret").unwrap();
    let h = auth
      .sign_at(1_700_000_000, "GET", "/v2/prices/BTC-USD/spot", None)
      .unwrap();
    let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec![HEADER_SIGN, HEADER_TIMESTAMP, HEADER_KEY]);
    assert_eq!(h.timestamp(), Some("1700000000"));
    assert_eq!(h.get(HEADER_KEY), Some("key-1"));
    assert_eq!(
      h.signature(),
      Some("eab6cdae655d3ea1929e3e3298a076482a47d636054280edba286761374c3394")
    );
  }

  #[test]
  fn any_changed_field_changes_signature() {
    let base = signature("k", 1, "GET", "/v2/user", None).unwrap();
    assert_ne!(base, signature("k", 2, "GET", "/v2/user", None).unwrap());
    assert_ne!(base, signature("k", 1, "PUT", "/v2/user", None).unwrap());
    assert_ne!(base, signature("k", 1, "GET", "/v2/users", None).unwrap());
    assert_ne!(base, signature("k", 1, "GET", "/v2/user", Some("{}")).unwrap());
    assert_ne!(base, signature("k2", 1, "GET", "/v2/user", None).unwrap());
  }

  #[test]
  fn characters_outside_latin1_are_rejected() {
    let err = WalletAuth::new("k", "key\u{20ac}").unwrap_err();
    assert!(matches!(
      err,
      AuthError::EncodingError {
        field: "secret",
        position: 3
      }
    ));

    let err = signature("k", 1, "GET", "/v2/\u{1f600}", None).unwrap_err();
    assert!(matches!(err, AuthError::EncodingError { field: "message", .. }));
  }

  #[test]
  fn latin1_upper_boundary_is_accepted() {
    assert_eq!(latin1_bytes("t", "\u{ff}").unwrap(), vec![0xff]);
    assert!(latin1_bytes("t", "\u{100}").is_err());
  }

  #[test]
  fn invalid_utf8_body_is_an_encoding_error() {
    let auth = WalletAuth::new("k", "s").unwrap();
    let req = RequestParts::new("POST", "/v2/x", &[0x61, 0xff]);
    let err = auth.sign(&req).unwrap_err();
    assert!(matches!(
      err,
      AuthError::EncodingError {
        field: "body",
        position: 1
      }
    ));
  }
}
