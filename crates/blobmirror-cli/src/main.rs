//! blobmirror CLI
//!
//! Mirrors a catalog of bucket objects into a local tree, daily or for a
//! monthly closure.

mod cli;
mod commands;
mod context;
mod error;
mod interactive;
mod logging;

use clap::Parser;
use colored::Colorize;

use cli::Cli;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::execute(cli))
}
