//! Command implementations for blobmirror-cli

pub mod sync;

use blobmirror_core::ClosurePeriod;

use crate::cli::{Cli, Commands};
use crate::context::AppContext;
use crate::error::Result;
use crate::interactive;

pub use sync::{run_closure, run_daily};

enum Run {
    Daily,
    Closure(ClosurePeriod),
    Menu,
}

/// Dispatch a parsed command line.
pub async fn execute(cli: Cli) -> Result<()> {
    // Closure input is checked before the config or the remote is touched.
    let run = match cli.command.unwrap_or(Commands::Menu) {
        Commands::Daily => Run::Daily,
        Commands::Closure { year, month } => Run::Closure(ClosurePeriod::new(year, month)?),
        Commands::Menu => Run::Menu,
    };

    let ctx = AppContext::load(cli.config.as_deref(), cli.verbose, cli.json)?;

    match run {
        Run::Daily => run_daily(&ctx).await,
        Run::Closure(period) => run_closure(&ctx, period).await,
        Run::Menu => interactive::run_menu(&ctx).await,
    }
}
