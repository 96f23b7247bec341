//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// blobmirror - Mirror bucket objects into a local tree with backups
#[derive(Parser, Debug)]
#[command(name = "blobmirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "BLOBMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// More console output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// The command to run (defaults to the interactive menu)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Sync the daily view of the catalog
    Daily,

    /// Sync the closure files of one month
    ///
    /// Examples:
    ///   blobmirror closure --year 2024 --month 3
    Closure {
        /// Closure year (2021-2039)
        #[arg(long)]
        year: i32,

        /// Closure month (1-12)
        #[arg(long)]
        month: u32,
    },

    /// Choose a run from an interactive menu
    Menu,
}
