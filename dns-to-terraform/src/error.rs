use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
  #[error("cannot read filter source {}: {source}", path.display())]
  SourceUnreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("fetching filter source {url} failed: {reason}")]
  FetchFailed { url: String, reason: String },
}
