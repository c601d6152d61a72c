//! Line classification for ad-block, plain domain and hosts-file lists.

use regex::Regex;
use scripts_core::config::ExceptionPolicy;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::OnceLock;

const BLOCK_MARKER: &str = "||";
const EXCEPTION_MARKER: &str = "@@||";
const HOSTS_PREFIXES: &[&str] = &["127.0.0.1", "0.0.0.0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
  BlockRule,
  ExceptionRule,
  PlainDomain,
  HostsEntry,
  Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  Wildcard,
  Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule<'a> {
  pub raw: &'a str,
  pub kind: RuleKind,
  /// Absent for unrecognized lines and rejected rules.
  pub domain: Option<String>,
  pub rejection: Option<Rejection>,
}

impl<'a> FilterRule<'a> {
  fn unrecognized(raw: &'a str) -> Self {
    Self {
      raw,
      kind: RuleKind::Unrecognized,
      domain: None,
      rejection: None,
    }
  }

  fn extracted(raw: &'a str, kind: RuleKind, candidate: &str) -> Self {
    let rejection = if candidate.is_empty() {
      Some(Rejection::Empty)
    } else if candidate.contains('*') {
      Some(Rejection::Wildcard)
    } else {
      None
    };
    Self {
      raw,
      kind,
      domain: rejection.is_none().then(|| candidate.to_string()),
      rejection,
    }
  }

  /// True when the rule contributes to the block list.
  pub fn blocks(&self) -> bool {
    self.domain.is_some()
      && matches!(
        self.kind,
        RuleKind::BlockRule | RuleKind::PlainDomain | RuleKind::HostsEntry
      )
  }
}

fn domain_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,6}$")
      .expect("domain pattern is valid")
  })
}

/// Dot-joined labels of letters, digits and hyphens (1-63 characters, no
/// hyphen at either end) ending in a 2-6 letter top-level label.
pub fn is_domain(text: &str) -> bool {
  domain_regex().is_match(text)
}

/// Classifies one line; the first matching syntax wins.
pub fn classify(raw: &str) -> FilterRule<'_> {
  let line = raw.trim_end();

  if let Some(rest) = line.strip_prefix(BLOCK_MARKER) {
    return FilterRule::extracted(raw, RuleKind::BlockRule, rule_domain(rest));
  }

  if let Some(rest) = line.strip_prefix(EXCEPTION_MARKER) {
    return FilterRule::extracted(raw, RuleKind::ExceptionRule, rule_domain(rest));
  }

  let trimmed = line.trim_start();
  if is_domain(trimmed) {
    return FilterRule::extracted(raw, RuleKind::PlainDomain, trimmed);
  }

  if let Some(host) = hosts_entry_host(line) {
    return FilterRule::extracted(raw, RuleKind::HostsEntry, host);
  }

  FilterRule::unrecognized(raw)
}

/// Everything after the marker up to the `^` separator or the `$` option list.
fn rule_domain(rest: &str) -> &str {
  let end = rest.find(['^', '$']).unwrap_or(rest.len());
  rest[..end].trim_end_matches('|').trim()
}

fn hosts_entry_host(line: &str) -> Option<&str> {
  let rest = HOSTS_PREFIXES
    .iter()
    .find_map(|prefix| line.strip_prefix(prefix))?;
  if !rest.starts_with(char::is_whitespace) {
    return None;
  }

  let rest = match rest.find('#') {
    Some(i) => &rest[..i],
    None => rest,
  };
  let host = rest.split_whitespace().next()?;
  // `0.0.0.0 0.0.0.0` style self entries carry no hostname.
  if host.parse::<IpAddr>().is_ok() {
    return None;
  }
  Some(host)
}

/// Sorted, duplicate-free block and exception domain lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFilterSet {
  pub blocked: Vec<String>,
  pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
  pub lines: usize,
  pub block_rules: usize,
  pub exception_rules: usize,
  pub rejected: usize,
  pub ignored: usize,
}

pub fn parse_lines<I, S>(lines: I, policy: ExceptionPolicy) -> (ParsedFilterSet, ParseStats)
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut blocked = BTreeSet::new();
  let mut exceptions = BTreeSet::new();
  let mut stats = ParseStats::default();

  for line in lines {
    let line = line.as_ref();
    stats.lines += 1;
    let rule = classify(line);

    if let Some(rejection) = rule.rejection {
      stats.rejected += 1;
      match rejection {
        Rejection::Wildcard => {
          tracing::warn!(rule = rule.raw.trim(), "unable to save rule with a wildcard")
        }
        Rejection::Empty => tracing::warn!(rule = rule.raw.trim(), "rule has no domain"),
      }
      continue;
    }

    let Some(domain) = rule.domain else {
      stats.ignored += 1;
      tracing::debug!(line = line.trim(), "ignoring unrecognized line");
      continue;
    };

    match rule.kind {
      RuleKind::ExceptionRule => {
        stats.exception_rules += 1;
        match policy {
          ExceptionPolicy::Record => {
            tracing::info!(domain = %domain, "saving domain to exception list");
            exceptions.insert(domain);
          }
          ExceptionPolicy::Discard => {
            tracing::info!(domain = %domain, "exception rule seen; discarded by policy");
          }
        }
      }
      _ => {
        stats.block_rules += 1;
        tracing::info!(domain = %domain, kind = ?rule.kind, "saving domain to filter list");
        blocked.insert(domain);
      }
    }
  }

  let set = ParsedFilterSet {
    blocked: blocked.into_iter().collect(),
    exceptions: exceptions.into_iter().collect(),
  };
  (set, stats)
}
