use crate::config::HttpConfig;
use anyhow::Context;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Url;
use std::io::Read;
use std::time::Duration;

pub fn build_client(cfg: &HttpConfig) -> anyhow::Result<Client> {
  let redirect = if cfg.max_redirects == 0 {
    Policy::none()
  } else {
    Policy::limited(cfg.max_redirects)
  };

  Client::builder()
    .timeout(Duration::from_secs(cfg.timeout_seconds))
    .redirect(redirect)
    .build()
    .context("build HTTP client")
}

/// GET `url` and return the body. Anything but 200 is an error, as is a body
/// larger than `max_bytes`.
pub fn get_bytes(
  client: &Client,
  url: &Url,
  headers: HeaderMap,
  max_bytes: usize,
) -> anyhow::Result<Vec<u8>> {
  let response = client
    .get(url.clone())
    .header(USER_AGENT, user_agent())
    .headers(headers)
    .send()
    .with_context(|| format!("GET {}", safe_url_label(url)))?;

  if response.status().as_u16() != 200 {
    anyhow::bail!(
      "unexpected HTTP status {} for {}",
      response.status().as_u16(),
      safe_url_label(url)
    );
  }

  read_response_with_limit(response, max_bytes)
}

pub fn get_json(
  client: &Client,
  url: &Url,
  headers: HeaderMap,
  max_bytes: usize,
) -> anyhow::Result<serde_json::Value> {
  let body = get_bytes(client, url, headers, max_bytes)?;
  serde_json::from_slice(&body).with_context(|| format!("parse JSON from {}", safe_url_label(url)))
}

pub fn user_agent() -> String {
  format!("ops-scripts/{}", env!("CARGO_PKG_VERSION"))
}

fn read_response_with_limit(response: Response, max_bytes: usize) -> anyhow::Result<Vec<u8>> {
  let mut out = Vec::new();
  let mut limited = response.take((max_bytes.saturating_add(1)) as u64);
  limited
    .read_to_end(&mut out)
    .context("read response body")?;

  if out.len() > max_bytes {
    anyhow::bail!("response exceeds max size {} bytes", max_bytes);
  }

  Ok(out)
}

/// Host and path only; query strings can carry API keys.
pub fn safe_url_label(url: &Url) -> String {
  let host = url.host_str().unwrap_or("<no-host>");
  let mut path = url.path().to_string();
  if path.is_empty() {
    path = "/".to_string();
  }
  format!("{host}{path}")
}
