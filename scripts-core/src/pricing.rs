use anyhow::Context;
use std::collections::HashMap;

use crate::auth::WalletAuth;
use crate::coinbase::ApiClient;
use crate::config::PricingConfig;

pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceSource {
  /// Pegged or untrackable; no lookup happens.
  Fixed(f64),
  Coinbase,
  CoinMarketCap,
}

/// Coin symbol to pricing source. Anything not listed goes to CoinMarketCap.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
  sources: HashMap<String, PriceSource>,
}

impl PricingTable {
  /// Later lists win when a symbol appears more than once, in the order
  /// coinbase, untracked, stable.
  pub fn from_config(cfg: &PricingConfig) -> Self {
    let mut sources = HashMap::new();
    for s in &cfg.coinbase {
      sources.insert(s.clone(), PriceSource::Coinbase);
    }
    for s in &cfg.untracked {
      sources.insert(s.clone(), PriceSource::Fixed(0.0));
    }
    for s in &cfg.stable {
      sources.insert(s.clone(), PriceSource::Fixed(1.0));
    }
    Self { sources }
  }

  pub fn source_for(&self, symbol: &str) -> PriceSource {
    self
      .sources
      .get(symbol)
      .copied()
      .unwrap_or(PriceSource::CoinMarketCap)
  }
}

pub trait PriceOracle {
  fn coinbase_spot(&self, symbol: &str) -> anyhow::Result<f64>;
  fn coinmarketcap(&self, slug: &str) -> anyhow::Result<f64>;
}

/// Live lookups against Coinbase (signed) and CoinMarketCap (API key).
pub struct LiveOracle<'a> {
  pub client: &'a ApiClient,
  pub wallet_auth: &'a WalletAuth,
  pub cmc_api_key: &'a str,
}

impl PriceOracle for LiveOracle<'_> {
  fn coinbase_spot(&self, symbol: &str) -> anyhow::Result<f64> {
    self.client.coinbase_spot_price(self.wallet_auth, symbol)
  }

  fn coinmarketcap(&self, slug: &str) -> anyhow::Result<f64> {
    self.client.coinmarketcap_price(self.cmc_api_key, slug)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
  pub symbol: String,
  pub price: f64,
  pub source: PriceSource,
  pub fetched_at: String,
}

/// Prices every symbol in order. The first failed lookup aborts the run.
pub fn quote_all(
  symbols: &[String],
  table: &PricingTable,
  oracle: &dyn PriceOracle,
) -> anyhow::Result<Vec<Quote>> {
  let mut out = Vec::with_capacity(symbols.len());
  for symbol in symbols {
    let source = table.source_for(symbol);
    let price = match source {
      PriceSource::Fixed(v) => v,
      PriceSource::Coinbase => oracle
        .coinbase_spot(symbol)
        .with_context(|| format!("Coinbase price for {symbol}"))?,
      PriceSource::CoinMarketCap => oracle
        .coinmarketcap(symbol)
        .with_context(|| format!("CoinMarketCap price for {symbol}"))?,
    };
    tracing::info!(symbol = %symbol, price, source = ?source, "priced");
    out.push(Quote {
      symbol: symbol.clone(),
      price,
      source,
      fetched_at: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
    });
  }
  Ok(out)
}

/// One `symbol,price,timestamp` row per quote.
pub fn render_csv(quotes: &[Quote]) -> String {
  let mut out = String::from("symbol,price,fetched_at\n");
  for q in quotes {
    out.push_str(&format!("{},{},{}\n", q.symbol, q.price, q.fetched_at));
  }
  out
}

/// Reads one symbol per line, skipping blanks and `#` comments.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
  raw
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty() && !l.starts_with('#'))
    .map(str::to_string)
    .collect()
}
