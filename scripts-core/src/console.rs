use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use crate::coinbase::ApiClient;
use crate::config::Config;
use crate::credentials::{CredentialStore, JsonFileStore};
use crate::pricing::{self, LiveOracle, PricingTable};

/// Listing windows are capped at ten years.
const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

#[derive(Parser, Debug)]
#[command(
  name = "ops-scripts",
  version,
  about = "Crypto price lookups and Coinbase Pro listings"
)]
pub struct Cli {
  /// Path to config.toml (defaults to the ops-scripts home directory)
  #[arg(long, global = true)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Print the current USD price of each symbol
  Prices {
    /// Coin symbols or CoinMarketCap slugs
    symbols: Vec<String>,

    /// File with one symbol per line, read before the positional symbols
    #[arg(long)]
    symbols_file: Option<PathBuf>,

    /// Coinbase credentials JSON (API_Key, API_Secret)
    #[arg(short = 'c', long)]
    coinbase_creds: PathBuf,

    /// CoinMarketCap API key
    #[arg(short = 'm', long, env = "CMC_API_KEY")]
    cmc_api_key: String,
  },
  /// List Coinbase Pro transfers from the last N hours
  CbproTransfers {
    /// Coinbase Pro credentials JSON (API_Key, API_Secret, Passphrase)
    #[arg(short = 'c', long)]
    creds: PathBuf,

    #[arg(
      long,
      default_value_t = 12,
      value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS)
    )]
    hours: i64,
  },
  /// List completed Coinbase Pro orders from the last N hours
  CbproOrders {
    #[arg(short = 'c', long)]
    creds: PathBuf,

    #[arg(
      long,
      default_value_t = 12,
      value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS)
    )]
    hours: i64,
  },
}

pub fn run_command(cfg: &Config, command: Command) -> anyhow::Result<()> {
  let client = ApiClient::new(&cfg.http, &cfg.endpoints)?;

  match command {
    Command::Prices {
      symbols,
      symbols_file,
      coinbase_creds,
      cmc_api_key,
    } => {
      let mut all = Vec::new();
      if let Some(path) = symbols_file {
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        all.extend(pricing::parse_symbol_list(&raw));
      }
      all.extend(symbols);
      if all.is_empty() {
        anyhow::bail!("no symbols given; pass symbols or --symbols-file");
      }

      let store = JsonFileStore::with_wallet(coinbase_creds);
      let wallet_auth = store.wallet()?.authenticator()?;
      let oracle = LiveOracle {
        client: &client,
        wallet_auth: &wallet_auth,
        cmc_api_key: &cmc_api_key,
      };
      let table = PricingTable::from_config(&cfg.pricing);
      let quotes = pricing::quote_all(&all, &table, &oracle)?;
      print!("{}", pricing::render_csv(&quotes));
      Ok(())
    }
    Command::CbproTransfers { creds, hours } => {
      let auth = JsonFileStore::with_pro(creds).pro()?.authenticator()?;
      let body = client.pro_transfers_since(&auth, hours)?;
      println!("{}", serde_json::to_string_pretty(&body)?);
      Ok(())
    }
    Command::CbproOrders { creds, hours } => {
      let auth = JsonFileStore::with_pro(creds).pro()?.authenticator()?;
      let body = client.pro_orders_since(&auth, hours)?;
      println!("{}", serde_json::to_string_pretty(&body)?);
      Ok(())
    }
  }
}
