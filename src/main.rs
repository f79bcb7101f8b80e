mod app;
mod cli;
mod client;
mod domain;
mod infra;
mod protocol;
mod server;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
