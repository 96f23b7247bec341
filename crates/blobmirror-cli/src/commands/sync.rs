//! Daily and closure runs, and how their summaries are shown

use colored::Colorize;
use serde_json::json;

use blobmirror_core::{ClosurePeriod, ClosureSummary, EntryStatus, SyncSummary};

use crate::context::AppContext;
use crate::error::{CliError, Result};

/// Run the daily view of the catalog.
pub async fn run_daily(ctx: &AppContext) -> Result<()> {
    let catalog = ctx.catalog.daily_view(&ctx.settings.daily);
    if !ctx.json {
        println!(
            "{} Daily sync of {} objects ({})",
            "=>".blue().bold(),
            catalog.len(),
            ctx.config_path.display()
        );
    }

    let session = ctx.start_session()?;
    let summary = session.engine.run_daily_sync(&catalog, &session.sink).await;
    session.finish().await?;

    if ctx.json {
        let counts = summary.counts();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "counts": counts,
                "outcomes": summary.outcomes,
                "warnings": summary.warnings,
            }))?
        );
    } else {
        print_summary(&summary);
    }
    check_failures(&summary)
}

/// Look for and sync the closure files of `period`.
pub async fn run_closure(ctx: &AppContext, period: ClosurePeriod) -> Result<()> {
    if !ctx.json {
        println!(
            "{} Closure sync for {} ({})",
            "=>".blue().bold(),
            period,
            period.tag()
        );
    }

    let session = ctx.start_session()?;
    let summary = session
        .engine
        .run_closure_sync(&ctx.catalog, period, &session.sink)
        .await;
    session.finish().await?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&closure_json(&summary))?);
    } else if summary.none_found() {
        println!(
            "{} No closures found for {}",
            "INFO".cyan().bold(),
            summary.period
        );
    } else {
        println!(
            "   {} of {} closure files found",
            summary.found,
            summary.found + summary.absent
        );
        print_summary(&summary.sync);
    }
    check_failures(&summary.sync)
}

fn closure_json(summary: &ClosureSummary) -> serde_json::Value {
    json!({
        "period": summary.period,
        "tag": summary.tag,
        "found": summary.found,
        "absent": summary.absent,
        "none_found": summary.none_found(),
        "counts": summary.sync.counts(),
        "outcomes": summary.sync.outcomes,
        "warnings": summary.sync.warnings,
    })
}

fn print_summary(summary: &SyncSummary) {
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(EntryStatus::Updated { backup, bytes }) => {
                println!(
                    "   {} {} ({} bytes)",
                    "UPDATED".green().bold(),
                    outcome.destination.display(),
                    bytes
                );
                if let Some(backup) = backup {
                    println!("     {} {}", "backup".dimmed(), backup.new_name);
                }
            }
            Ok(EntryStatus::Unchanged) => {
                println!("   {} {}", "UNCHANGED".dimmed(), outcome.object_name);
            }
            Ok(EntryStatus::NotFound) => {
                println!("   {} {}", "NOT FOUND".yellow().bold(), outcome.object_name);
            }
            Err(e) => {
                println!("   {} {}: {}", "FAILED".red().bold(), outcome.object_name, e);
            }
        }
    }

    for warning in &summary.warnings {
        println!("   {} {}", "WARNING".yellow().bold(), warning);
    }

    let counts = summary.counts();
    println!();
    println!(
        "{} {} updated, {} unchanged, {} not found, {} failed, {} backups",
        "Done.".bold(),
        counts.updated,
        counts.unchanged,
        counts.not_found,
        counts.failed,
        counts.backups
    );
}

fn check_failures(summary: &SyncSummary) -> Result<()> {
    let counts = summary.counts();
    if counts.failed == 0 {
        return Ok(());
    }
    Err(CliError::user(format!(
        "{} of {} objects failed",
        counts.failed,
        summary.outcomes.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobmirror_core::{EntryOutcome, SyncError};

    fn summary(results: Vec<std::result::Result<EntryStatus, SyncError>>) -> SyncSummary {
        SyncSummary {
            outcomes: results
                .into_iter()
                .enumerate()
                .map(|(i, r)| EntryOutcome::new(format!("F{i}.csv"), format!("/b/F{i}.csv"), r))
                .collect(),
            warnings: vec![],
        }
    }

    #[test]
    fn failures_turn_into_an_error() {
        assert!(check_failures(&summary(vec![Ok(EntryStatus::Unchanged)])).is_ok());

        let err = check_failures(&summary(vec![
            Ok(EntryStatus::Unchanged),
            Err(SyncError::Cancelled),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 objects failed");
    }

    #[test]
    fn closure_json_reports_none_found() {
        let closure = ClosureSummary {
            period: ClosurePeriod::new(2024, 3).unwrap(),
            tag: "CIERRE_202403".into(),
            found: 0,
            absent: 2,
            sync: SyncSummary::default(),
        };
        let value = closure_json(&closure);
        assert_eq!(value["none_found"], true);
        assert_eq!(value["period"]["month"], 3);
        assert_eq!(value["counts"]["updated"], 0);
    }
}
