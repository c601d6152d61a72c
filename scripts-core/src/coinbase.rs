use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde_json::Value;

use crate::auth::{path_and_query, RequestAuthenticator, RequestParts};
use crate::config::{EndpointsConfig, HttpConfig};
use crate::http;

const CMC_KEY_HEADER: &str = "x-cmc_pro_api_key";

/// Thin client for the handful of Coinbase, Coinbase Pro and CoinMarketCap
/// endpoints the scripts use.
pub struct ApiClient {
  http: Client,
  endpoints: EndpointsConfig,
  max_body_bytes: usize,
}

impl ApiClient {
  pub fn new(http_cfg: &HttpConfig, endpoints: &EndpointsConfig) -> anyhow::Result<Self> {
    Ok(Self {
      http: http::build_client(http_cfg)?,
      endpoints: endpoints.clone(),
      max_body_bytes: http_cfg.max_body_bytes,
    })
  }

  /// USD spot price from the Coinbase wallet API.
  pub fn coinbase_spot_price(
    &self,
    auth: &dyn RequestAuthenticator,
    symbol: &str,
  ) -> anyhow::Result<f64> {
    let url = join(
      &self.endpoints.coinbase_api,
      &format!("v2/prices/{symbol}-USD/spot"),
    )?;
    let body = self.signed_get(auth, &url)?;
    parse_spot_amount(&body).with_context(|| format!("spot price for {symbol}"))
  }

  /// USD quote for a CoinMarketCap slug.
  pub fn coinmarketcap_price(&self, api_key: &str, slug: &str) -> anyhow::Result<f64> {
    let mut url = join(
      &self.endpoints.coinmarketcap_api,
      "v1/cryptocurrency/quotes/latest",
    )?;
    url
      .query_pairs_mut()
      .append_pair("slug", slug)
      .append_pair("convert", "USD");

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
      CMC_KEY_HEADER,
      HeaderValue::from_str(api_key).context("CoinMarketCap API key is not a valid header")?,
    );

    let body = http::get_json(&self.http, &url, headers, self.max_body_bytes)?;
    parse_cmc_price(&body).with_context(|| format!("CoinMarketCap quote for {slug}"))
  }

  /// Coinbase Pro transfers from the last `hours` hours.
  pub fn pro_transfers_since(
    &self,
    auth: &dyn RequestAuthenticator,
    hours: i64,
  ) -> anyhow::Result<Value> {
    let mut url = join(&self.endpoints.coinbase_pro_api, "transfers")?;
    url
      .query_pairs_mut()
      .append_pair("before", &before_param(Utc::now(), hours)?);
    self.signed_get(auth, &url)
  }

  /// Completed Coinbase Pro orders from the last `hours` hours.
  pub fn pro_orders_since(
    &self,
    auth: &dyn RequestAuthenticator,
    hours: i64,
  ) -> anyhow::Result<Value> {
    let mut url = join(&self.endpoints.coinbase_pro_api, "orders")?;
    url
      .query_pairs_mut()
      .append_pair("status", "done")
      .append_pair("before", &before_param(Utc::now(), hours)?);
    self.signed_get(auth, &url)
  }

  fn signed_get(&self, auth: &dyn RequestAuthenticator, url: &Url) -> anyhow::Result<Value> {
    let path = path_and_query(url);
    let headers = auth
      .sign(&RequestParts::without_body("GET", &path))
      .and_then(|h| h.to_header_map())
      .with_context(|| format!("sign request for {}", http::safe_url_label(url)))?;
    http::get_json(&self.http, url, headers, self.max_body_bytes)
  }
}

fn join(base: &str, rel: &str) -> anyhow::Result<Url> {
  let base = Url::parse(base).with_context(|| format!("invalid endpoint: {base}"))?;
  base
    .join(rel)
    .with_context(|| format!("build URL {rel} from {base}"))
}

/// `now - hours` as a naive UTC ISO-8601 timestamp with microseconds.
pub fn before_param(now: DateTime<Utc>, hours: i64) -> anyhow::Result<String> {
  let window = chrono::Duration::try_hours(hours)
    .ok_or_else(|| anyhow::anyhow!("window of {hours} hours is out of range"))?;
  let before = now
    .checked_sub_signed(window)
    .ok_or_else(|| anyhow::anyhow!("window of {hours} hours predates the calendar range"))?;
  Ok(before.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
}

/// Reads `data.amount`, which Coinbase returns as a decimal string.
pub fn parse_spot_amount(body: &Value) -> anyhow::Result<f64> {
  let amount = body
    .pointer("/data/amount")
    .ok_or_else(|| anyhow::anyhow!("response has no data.amount"))?;
  match amount {
    Value::String(s) => s
      .parse::<f64>()
      .with_context(|| format!("data.amount is not a number: {s}")),
    Value::Number(n) => n
      .as_f64()
      .ok_or_else(|| anyhow::anyhow!("data.amount out of range")),
    other => anyhow::bail!("unexpected data.amount type: {other}"),
  }
}

/// Reads `data.<id>.quote.USD.price`. The response is keyed by coin id; when
/// a slug matches several coins the last entry in response order wins.
pub fn parse_cmc_price(body: &Value) -> anyhow::Result<f64> {
  let data = body
    .get("data")
    .and_then(Value::as_object)
    .ok_or_else(|| anyhow::anyhow!("response has no data object"))?;

  data
    .values()
    .filter_map(|coin| coin.pointer("/quote/USD/price").and_then(Value::as_f64))
    .last()
    .ok_or_else(|| anyhow::anyhow!("response has no USD quote"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use serde_json::json;

  #[test]
  fn spot_amount_is_parsed_from_string() {
    let body = json!({"data": {"base": "BTC", "currency": "USD", "amount": "43210.55"}});
    assert_eq!(parse_spot_amount(&body).unwrap(), 43210.55);
  }

  #[test]
  fn spot_amount_missing_is_an_error() {
    let body = json!({"errors": [{"id": "not_found"}]});
    assert!(parse_spot_amount(&body).is_err());
  }

  #[test]
  fn cmc_price_is_read_from_usd_quote() {
    let body = json!({
      "status": {"error_code": 0},
      "data": {"1": {"slug": "bitcoin", "quote": {"USD": {"price": 30123.4}}}}
    });
    assert_eq!(parse_cmc_price(&body).unwrap(), 30123.4);
  }

  #[test]
  fn cmc_multi_match_takes_last_coin_in_response_order() {
    let raw = r#"{"data": {
      "2": {"slug": "x", "quote": {"USD": {"price": 2.0}}},
      "10": {"slug": "x", "quote": {"USD": {"price": 10.0}}},
      "1": {"slug": "x", "quote": {"USD": {"price": 1.0}}}
    }}"#;
    let body: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(parse_cmc_price(&body).unwrap(), 1.0);
  }

  #[test]
  fn cmc_without_quote_is_an_error() {
    let body = json!({"data": {}});
    assert!(parse_cmc_price(&body).is_err());
  }

  #[test]
  fn before_param_subtracts_hours_in_utc() {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    assert_eq!(before_param(now, 12).unwrap(), "2024-03-10T00:00:00.000000");
  }

  #[test]
  fn before_param_rejects_overflowing_window() {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    assert!(before_param(now, 1_000_000_000_000).is_err());
    assert!(before_param(now, i64::MAX).is_err());
  }

  #[test]
  fn join_keeps_base_path() {
    let url = join("https://api.coinbase.com/", "v2/prices/BTC-USD/spot").unwrap();
    assert_eq!(url.as_str(), "https://api.coinbase.com/v2/prices/BTC-USD/spot");
  }
}
