use anyhow::Context;
use clap::Parser;

fn main() -> anyhow::Result<()> {
  let cli = dns_to_terraform::Cli::parse();
  dns_to_terraform::run(cli).context("dns-to-terraform")
}
