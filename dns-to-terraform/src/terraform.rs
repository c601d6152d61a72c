use anyhow::Context;
use std::path::Path;

use crate::rules::ParsedFilterSet;

const HEADER: &str = "# Auto-generated file from converting a DNS filter list\n\n\n";

fn hcl_string(text: &str) -> String {
  text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn push_variable(out: &mut String, comment: &str, name: &str, description: &str, items: &[String]) {
  out.push_str(&format!("#{comment}\n"));
  out.push_str(&format!("variable \"{name}\" {{\n"));
  out.push_str(&format!("  description = \"{}\"\n", hcl_string(description)));
  out.push_str("  type = list(string)\n");
  out.push_str("  default = [\n");
  for item in items {
    out.push_str(&format!("  \"{}\",\n", hcl_string(item)));
  }
  out.push_str("  ]\n}\n\n");
}

/// `filter_list` is always present; `exception_list` only when there is
/// something in it.
pub fn render(set: &ParsedFilterSet, description: &str) -> String {
  let mut out = String::from(HEADER);
  push_variable(&mut out, "Filter list", "filter_list", description, &set.blocked);
  if !set.exceptions.is_empty() {
    push_variable(
      &mut out,
      "Exception list",
      "exception_list",
      description,
      &set.exceptions,
    );
  }
  out
}

/// Replaces `path` in one step; a failed write leaves the old file alone.
pub fn write(path: &Path, set: &ParsedFilterSet, description: &str) -> anyhow::Result<()> {
  scripts_core::config::write_atomic(path, &render(set, description))
    .with_context(|| format!("write {}", path.display()))?;
  tracing::info!(
    path = %path.display(),
    blocked = set.blocked.len(),
    exceptions = set.exceptions.len(),
    "terraform variables written"
  );
  Ok(())
}
