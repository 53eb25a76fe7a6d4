//! `vg errors`: inspect and override which statuses count as errors.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::Write;
use vigia_core::classify::{
    AllowListClassifier, ClassifierMode, ErrorClassifier, HeuristicClassifier, distinct_statuses,
    suggest_error_statuses,
};
use vigia_core::config::save_project_config;
use vigia_core::db::load_all_or_empty;

use super::ProjectContext;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `vg errors`.
#[derive(Args, Debug)]
pub struct ErrorsArgs {
    #[command(subcommand)]
    command: ErrorsCommand,
}

#[derive(Subcommand, Debug)]
enum ErrorsCommand {
    /// Show every status in the store and how it is classified
    List,
    /// Replace the heuristic with an explicit list of error statuses
    Set(SetArgs),
    /// Drop the explicit list and return to the heuristic
    Clear,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Statuses to treat as errors (case-insensitive).
    #[arg(value_name = "STATUS", required_unless_present = "suggested")]
    statuses: Vec<String>,

    /// Use the statuses the heuristic flags in the current data.
    #[arg(long, conflicts_with = "statuses")]
    suggested: bool,
}

#[derive(Debug, Serialize)]
struct StatusEntry {
    status: String,
    is_error: bool,
    suggested: bool,
}

#[derive(Debug, Serialize)]
struct StatusListing {
    mode: ClassifierMode,
    error_statuses: Vec<String>,
    suggested: Vec<String>,
    statuses: Vec<StatusEntry>,
}

#[derive(Debug, Serialize)]
struct ErrorsUpdate {
    ok: bool,
    mode: ClassifierMode,
    error_statuses: Vec<String>,
}

/// Execute `vg errors`.
///
/// # Errors
///
/// Returns an error if the project config cannot be written or, for
/// `set --suggested`, the data yields no suggestions.
pub fn run_errors(args: &ErrorsArgs, ctx: &ProjectContext, output: OutputMode) -> Result<()> {
    match &args.command {
        ErrorsCommand::List => run_list(ctx, output),
        ErrorsCommand::Set(set) => run_set(set, ctx, output),
        ErrorsCommand::Clear => update_statuses(ctx, Vec::new(), output),
    }
}

fn heuristic(ctx: &ProjectContext) -> HeuristicClassifier {
    HeuristicClassifier {
        partial_success: ctx.config.classify.partial_success,
    }
}

fn run_list(ctx: &ProjectContext, output: OutputMode) -> Result<()> {
    let records = load_all_or_empty(&ctx.store_path);
    let classifier = ctx.config.classifier();
    let suggested = suggest_error_statuses(&records, &heuristic(ctx));

    let statuses = distinct_statuses(&records)
        .into_iter()
        .map(|status| StatusEntry {
            is_error: classifier.is_error(&status),
            suggested: suggested.contains(&status),
            status,
        })
        .collect();

    let listing = StatusListing {
        mode: classifier.mode(),
        error_statuses: classifier.error_statuses(),
        suggested,
        statuses,
    };

    render(output, &listing, |listing, w| match output {
        OutputMode::Pretty => render_listing_pretty(listing, w),
        _ => render_listing_text(listing, w),
    })
}

fn render_listing_text(listing: &StatusListing, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "mode={}", listing.mode.as_str())?;
    for entry in &listing.statuses {
        writeln!(
            w,
            "status={:?} is_error={} suggested={}",
            entry.status, entry.is_error, entry.suggested
        )?;
    }
    Ok(())
}

fn render_listing_pretty(listing: &StatusListing, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Error classification")?;
    pretty_kv(w, "Mode", listing.mode.as_str())?;
    if !listing.error_statuses.is_empty() {
        pretty_kv(w, "Explicit", listing.error_statuses.join(", "))?;
    }
    pretty_kv(
        w,
        "Suggested",
        if listing.suggested.is_empty() {
            "(none)".to_string()
        } else {
            listing.suggested.join(", ")
        },
    )?;

    if listing.statuses.is_empty() {
        writeln!(w)?;
        return writeln!(w, "No statuses in the store yet.");
    }

    writeln!(w)?;
    for entry in &listing.statuses {
        let marker = if entry.is_error { "error" } else { "ok" };
        writeln!(w, "  {marker:<6} {}", entry.status)?;
    }
    Ok(())
}

fn run_set(args: &SetArgs, ctx: &ProjectContext, output: OutputMode) -> Result<()> {
    let statuses = if args.suggested {
        let records = load_all_or_empty(&ctx.store_path);
        let suggested = suggest_error_statuses(&records, &heuristic(ctx));
        if suggested.is_empty() {
            bail!("No error statuses to suggest; ingest data first or list statuses explicitly");
        }
        suggested
    } else {
        args.statuses.clone()
    };

    let allow = AllowListClassifier::new(&statuses);
    if allow.is_empty() {
        bail!("Error status list must contain at least one non-blank status");
    }
    update_statuses(ctx, allow.statuses().map(str::to_string).collect(), output)
}

fn update_statuses(ctx: &ProjectContext, statuses: Vec<String>, output: OutputMode) -> Result<()> {
    let mut config = ctx.config.clone();
    config.classify.error_statuses = statuses;
    save_project_config(&ctx.root, &config)?;

    let update = ErrorsUpdate {
        ok: true,
        mode: config.classifier().mode(),
        error_statuses: config.classify.error_statuses,
    };

    render(output, &update, |update, w| match output {
        OutputMode::Pretty => {
            if update.error_statuses.is_empty() {
                writeln!(w, "Error statuses cleared; using the heuristic")
            } else {
                writeln!(w, "Error statuses set: {}", update.error_statuses.join(", "))
            }
        }
        _ => writeln!(
            w,
            "ok=true mode={} error_statuses={}",
            update.mode.as_str(),
            update.error_statuses.join(",")
        ),
    })
}
