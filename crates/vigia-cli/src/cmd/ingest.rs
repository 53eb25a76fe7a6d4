//! `vg ingest`: normalize a CSV export and replace the stored snapshot.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use vigia_core::db::{Store, UploadMeta};
use vigia_core::error::IngestError;
use vigia_core::normalize::SchemaVariant;
use vigia_core::window::reference_day;

use super::ProjectContext;
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render, render_error};

/// Arguments for `vg ingest`.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// CSV export to load (`-` reads stdin).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Schema variant of the export (overrides `ingest.variant`).
    #[arg(long)]
    pub variant: Option<SchemaVariant>,

    /// Read slash dates as DD/MM/YYYY (overrides `ingest.day_first`).
    #[arg(long)]
    pub day_first: bool,

    /// Validate and summarize without touching the store.
    #[arg(long)]
    pub dry_run: bool,
}

/// Result payload for `vg ingest`.
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub variant: SchemaVariant,
    pub rows_parsed: usize,
    pub rows_written: usize,
    pub duplicates_collapsed: usize,
    pub reference_day: Option<NaiveDate>,
    pub store: String,
    pub dry_run: bool,
}

/// Execute `vg ingest`.
///
/// # Errors
///
/// Returns an error if the input cannot be read, fails validation, holds no
/// dated rows, or the store cannot be written. The stored snapshot is left
/// unchanged in every error case.
pub fn run_ingest(
    args: &IngestArgs,
    ctx: &ProjectContext,
    output: OutputMode,
    quiet: bool,
) -> Result<()> {
    let input = read_input(&args.file)?;
    let source = source_label(&args.file);

    let mut normalizer = ctx.config.normalizer();
    if let Some(variant) = args.variant {
        normalizer.variant = variant;
    }
    if args.day_first {
        normalizer.day_first = true;
    }

    let records = match normalizer.normalize(&input) {
        Ok(records) if records.is_empty() => {
            let err = IngestError::EmptyDataset;
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
        Ok(records) => records,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };

    let mut report = IngestReport {
        source: source.clone(),
        variant: normalizer.variant,
        rows_parsed: records.len(),
        rows_written: 0,
        duplicates_collapsed: 0,
        reference_day: reference_day(&records),
        store: ctx.store_path.display().to_string(),
        dry_run: args.dry_run,
    };

    if !args.dry_run {
        let summary = Store::open(&ctx.store_path)
            .and_then(|mut store| {
                store.replace_all_with(
                    &records,
                    &UploadMeta {
                        source: Some(source),
                        variant: Some(normalizer.variant.to_string()),
                    },
                )
            })
            .or_else(|err| {
                render_error(output, &CliError::from(&err))?;
                bail!(err)
            })?;
        report.rows_written = summary.rows_written;
        report.duplicates_collapsed = summary.duplicates_collapsed();
        info!(
            source = %report.source,
            rows_written = report.rows_written,
            "ingest complete"
        );
    }

    if quiet && !output.is_json() {
        return Ok(());
    }

    render(output, &report, |report, w| match output {
        OutputMode::Pretty => render_ingest_pretty(report, w),
        _ => render_ingest_text(report, w),
    })
}

fn read_input(file: &Path) -> Result<String> {
    let mut bytes = Vec::new();
    if file.as_os_str() == "-" {
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Failed to read stdin")?;
    } else {
        bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn source_label(file: &Path) -> String {
    if file.as_os_str() == "-" {
        return "stdin".to_string();
    }
    file.file_name()
        .map_or_else(|| file.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn render_ingest_text(report: &IngestReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "ok=true source={} variant={} rows_parsed={} rows_written={} duplicates_collapsed={} reference_day={} dry_run={}",
        report.source,
        report.variant,
        report.rows_parsed,
        report.rows_written,
        report.duplicates_collapsed,
        report
            .reference_day
            .map_or_else(|| "-".to_string(), |d| d.to_string()),
        report.dry_run,
    )
}

fn render_ingest_pretty(report: &IngestReport, w: &mut dyn Write) -> std::io::Result<()> {
    let heading = if report.dry_run {
        "Ingest (dry run)"
    } else {
        "Ingest"
    };
    pretty_section(w, heading)?;
    pretty_kv(w, "Source", &report.source)?;
    pretty_kv(w, "Variant", report.variant.as_str())?;
    pretty_kv(w, "Parsed", report.rows_parsed.to_string())?;
    if !report.dry_run {
        pretty_kv(
            w,
            "Written",
            format!(
                "{} ({} duplicates merged)",
                report.rows_written, report.duplicates_collapsed
            ),
        )?;
        pretty_kv(w, "Store", &report.store)?;
    }
    if let Some(day) = report.reference_day {
        pretty_kv(w, "Latest day", day.to_string())?;
    }
    Ok(())
}
