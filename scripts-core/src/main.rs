use anyhow::Context;
use clap::Parser;

fn main() -> anyhow::Result<()> {
  let cli = scripts_core::console::Cli::parse();
  scripts_core::run(cli).context("ops-scripts")
}
