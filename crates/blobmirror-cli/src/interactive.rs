//! Interactive menu
//!
//! Uses dialoguer for terminal-based selection and input.

use dialoguer::{Input, Select};

use blobmirror_core::ClosurePeriod;
use colored::Colorize;

use crate::commands::{run_closure, run_daily};
use crate::context::AppContext;
use crate::error::Result;

const MENU: &[&str] = &["Daily sync", "Closure sync", "Exit"];

/// What the user picked from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Daily,
    Closure,
    Exit,
}

impl MenuChoice {
    fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Daily,
            1 => Self::Closure,
            _ => Self::Exit,
        }
    }
}

/// Offer one run, perform it, and return its result.
///
/// The program ends after the chosen run, so a failed run exits non-zero
/// just like the `daily` and `closure` commands.
pub async fn run_menu(ctx: &AppContext) -> Result<()> {
    println!();
    let index = Select::new()
        .with_prompt("What do you want to run?")
        .items(MENU)
        .default(0)
        .interact()?;

    match MenuChoice::from_index(index) {
        MenuChoice::Daily => run_daily(ctx).await,
        MenuChoice::Closure => {
            let period = prompt_period()?;
            run_closure(ctx, period).await
        }
        MenuChoice::Exit => Ok(()),
    }
}

/// Ask for year and month until they form a valid closure period.
fn prompt_period() -> Result<ClosurePeriod> {
    loop {
        let year: String = Input::new()
            .with_prompt("Closure year (e.g. 2024)")
            .interact_text()?;
        let month: String = Input::new()
            .with_prompt("Closure month (1-12)")
            .interact_text()?;

        match ClosurePeriod::parse(&year, &month) {
            Ok(period) => return Ok(period),
            Err(e) => eprintln!("{}: {}", "error".red().bold(), e),
        }
    }
}
