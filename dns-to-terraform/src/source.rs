use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::Url;
use scripts_core::config::{ExceptionPolicy, HttpConfig};
use scripts_core::http;
use scripts_core::types::short_error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::FilterError;
use crate::rules::{self, ParseStats, ParsedFilterSet};

/// Downloads a remote filter list.
pub trait SourceFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FilterError>;
}

pub struct HttpFetcher {
  client: Client,
  max_bytes: usize,
}

impl HttpFetcher {
  pub fn new(cfg: &HttpConfig, max_bytes: usize) -> anyhow::Result<Self> {
    Ok(Self {
      client: http::build_client(cfg)?,
      max_bytes,
    })
  }
}

impl SourceFetcher for HttpFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FilterError> {
    let parsed = Url::parse(url).map_err(|e| FilterError::FetchFailed {
      url: url_label(url),
      reason: format!("invalid URL: {e}"),
    })?;
    tracing::info!(source = %http::safe_url_label(&parsed), "downloading filter list");

    http::get_bytes(&self.client, &parsed, HeaderMap::new(), self.max_bytes).map_err(|e| {
      FilterError::FetchFailed {
        url: http::safe_url_label(&parsed),
        reason: short_error(&e),
      }
    })
  }
}

/// A filter list ready to read. Remote lists live in a temporary file that is
/// removed when this value drops.
pub enum Acquired {
  Local(PathBuf),
  Remote(NamedTempFile),
}

impl Acquired {
  pub fn path(&self) -> &Path {
    match self {
      Acquired::Local(p) => p,
      Acquired::Remote(tmp) => tmp.path(),
    }
  }
}

/// Host and path of `source` for logs and errors; the query can carry tokens.
pub fn url_label(source: &str) -> String {
  Url::parse(source)
    .map(|u| http::safe_url_label(&u))
    .unwrap_or_else(|_| "<invalid url>".to_string())
}

/// `http://` or `https://`, in any letter case.
pub fn is_remote(source: &str) -> bool {
  ["http://", "https://"].iter().any(|scheme| {
    source
      .get(..scheme.len())
      .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
  })
}

pub fn acquire(source: &str, fetcher: &dyn SourceFetcher) -> Result<Acquired, FilterError> {
  acquire_in(source, fetcher, &std::env::temp_dir())
}

/// Like [`acquire`], with downloads stored under `tmp_dir`.
pub fn acquire_in(
  source: &str,
  fetcher: &dyn SourceFetcher,
  tmp_dir: &Path,
) -> Result<Acquired, FilterError> {
  if !is_remote(source) {
    return Ok(Acquired::Local(PathBuf::from(source)));
  }

  let body = fetcher.fetch(source)?;
  let store_failed = |e: std::io::Error| FilterError::FetchFailed {
    url: url_label(source),
    reason: format!("store downloaded list: {e}"),
  };
  let mut tmp = NamedTempFile::new_in(tmp_dir).map_err(store_failed)?;
  tmp.write_all(&body).map_err(store_failed)?;
  tmp.flush().map_err(store_failed)?;
  tracing::debug!(bytes = body.len(), path = %tmp.path().display(), "stored downloaded list");
  Ok(Acquired::Remote(tmp))
}

/// Reads and classifies a list on disk. Invalid UTF-8 is replaced rather than
/// failing the whole file.
pub fn parse_file(
  path: &Path,
  policy: ExceptionPolicy,
) -> Result<(ParsedFilterSet, ParseStats), FilterError> {
  let raw = fs::read(path).map_err(|source| FilterError::SourceUnreadable {
    path: path.to_path_buf(),
    source,
  })?;
  let text = String::from_utf8_lossy(&raw);
  Ok(rules::parse_lines(text.lines(), policy))
}

/// Acquires `source` (path or URL) and parses it once.
pub fn parse_source(
  source: &str,
  fetcher: &dyn SourceFetcher,
  policy: ExceptionPolicy,
) -> Result<(ParsedFilterSet, ParseStats), FilterError> {
  let acquired = acquire(source, fetcher)?;
  parse_file(acquired.path(), policy)
}
