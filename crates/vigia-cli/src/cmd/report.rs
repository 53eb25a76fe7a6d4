//! `vg report`: windowed dashboard over the stored snapshot.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use vigia_core::aggregate::{Kpi, TopErrors};
use vigia_core::classify::ClassifierMode;
use vigia_core::dashboard::{DashboardOutcome, WindowReport, WindowSummary, build_dashboard};
use vigia_core::db::{ReplaceInfo, load_all_or_empty};
use vigia_core::window::Window;

use super::ProjectContext;
use crate::output::{OutputMode, pct, pretty_kv, pretty_rule, pretty_section, render_mode};

/// Arguments for `vg report`.
#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Window to include (`today`, `7d`, `30d`); repeat for several. All
    /// three by default.
    #[arg(long = "window", value_name = "WINDOW")]
    pub windows: Vec<Window>,

    /// Number of error categories to rank (overrides `report.top_n`).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub top: Option<u16>,
}

/// Report payload for `vg report`.
#[derive(Debug, Serialize)]
pub struct ReportPayload {
    pub classifier: ClassifierMode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_statuses: Vec<String>,
    pub last_upload: Option<ReplaceInfo>,
    pub dashboard: DashboardOutcome,
}

/// Execute `vg report`.
///
/// An empty or missing store is reported as "no data" and is not an error.
///
/// # Errors
///
/// Returns an error if writing the output fails.
pub fn run_report(args: &ReportArgs, ctx: &ProjectContext, output: OutputMode) -> Result<()> {
    let classifier = ctx.config.classifier();
    let mut options = ctx.config.dashboard_options();
    if let Some(top) = args.top {
        options.top_n = usize::from(top);
    }
    if !args.windows.is_empty() {
        options.windows = dedup_windows(&args.windows);
    }

    let records = load_all_or_empty(&ctx.store_path);
    let last_upload = ctx.last_upload();
    options.dimension = ctx.stored_variant(last_upload.as_ref()).breakdown();

    let payload = ReportPayload {
        classifier: classifier.mode(),
        error_statuses: classifier.error_statuses(),
        last_upload,
        dashboard: build_dashboard(&records, &classifier, &options),
    };

    render_mode(output, &payload, render_report_text, render_report_pretty)
}

fn dedup_windows(requested: &[Window]) -> Vec<Window> {
    let mut windows = Vec::with_capacity(requested.len());
    for window in requested {
        if !windows.contains(window) {
            windows.push(*window);
        }
    }
    windows
}

fn render_report_text(payload: &ReportPayload, w: &mut dyn Write) -> io::Result<()> {
    let DashboardOutcome::Ready(dashboard) = &payload.dashboard else {
        return writeln!(w, "state=no_data");
    };

    writeln!(
        w,
        "reference_day={} classifier={}",
        dashboard.reference_day,
        payload.classifier.as_str()
    )?;
    for report in &dashboard.windows {
        let slug = report.window.slug();
        match &report.summary {
            WindowSummary::Empty => {
                writeln!(w, "window={slug} start={} end={} state=empty", report.start_day, report.end_day)?;
            }
            WindowSummary::Populated {
                kpi,
                by_status,
                top_errors,
            } => {
                writeln!(
                    w,
                    "window={slug} start={} end={} total={} errors={} success={} error_pct={:.1} success_pct={:.1}",
                    report.start_day,
                    report.end_day,
                    kpi.total,
                    kpi.errors,
                    kpi.success,
                    kpi.error_pct,
                    kpi.success_pct
                )?;
                for row in by_status {
                    writeln!(w, "status {slug} {} {} {}", row.dia, row.status, row.qtd)?;
                }
                match top_errors {
                    TopErrors::NoErrors => writeln!(w, "top_errors {slug} none")?,
                    TopErrors::Ranked { ranking, daily, .. } => {
                        for (rank, entry) in ranking.iter().enumerate() {
                            writeln!(w, "rank {slug} {} {} {}", rank + 1, entry.category, entry.qtd)?;
                        }
                        for row in daily {
                            writeln!(w, "error_daily {slug} {} {} {}", row.dia, row.category, row.qtd)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn render_report_pretty(payload: &ReportPayload, w: &mut dyn Write) -> io::Result<()> {
    let DashboardOutcome::Ready(dashboard) = &payload.dashboard else {
        writeln!(w, "No data available.")?;
        writeln!(w, "Upload an export with `vg ingest <file>` to populate the store.")?;
        return Ok(());
    };

    pretty_section(w, "Integration dashboard")?;
    pretty_kv(w, "Reference", dashboard.reference_day.to_string())?;
    let classifier = if payload.error_statuses.is_empty() {
        payload.classifier.as_str().to_string()
    } else {
        format!("{} ({})", payload.classifier.as_str(), payload.error_statuses.join(", "))
    };
    pretty_kv(w, "Errors via", classifier)?;
    if let Some(upload) = &payload.last_upload {
        let source = upload.source.as_deref().unwrap_or("unknown source");
        pretty_kv(
            w,
            "Last upload",
            format!(
                "{} ({source}, {} rows)",
                upload.replaced_at.format("%Y-%m-%d %H:%M UTC"),
                upload.rows_written
            ),
        )?;
    }

    for report in &dashboard.windows {
        writeln!(w)?;
        render_window_pretty(report, w)?;
    }
    Ok(())
}

fn render_window_pretty(report: &WindowReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(
        w,
        &format!("{}  [{} .. {}]", report.label, report.start_day, report.end_day),
    )?;

    let (kpi, by_status, top_errors) = match &report.summary {
        WindowSummary::Empty => return writeln!(w, "No rows in this window."),
        WindowSummary::Populated {
            kpi,
            by_status,
            top_errors,
        } => (kpi, by_status, top_errors),
    };

    render_kpi_pretty(kpi, w)?;

    writeln!(w)?;
    writeln!(w, "Volume by day and status")?;
    let status_width = by_status
        .iter()
        .map(|row| row.status.chars().count())
        .max()
        .unwrap_or(0)
        .max("status".len());
    writeln!(w, "  {:<10}  {:<status_width$}  {:>10}", "dia", "status", "qtd")?;
    for row in by_status {
        writeln!(w, "  {:<10}  {:<status_width$}  {:>10}", row.dia, row.status, row.qtd)?;
    }

    writeln!(w)?;
    match top_errors {
        TopErrors::NoErrors => writeln!(w, "No errors in this window.")?,
        TopErrors::Ranked {
            dimension,
            ranking,
            daily,
        } => {
            writeln!(w, "Top errors by {dimension}")?;
            let name_width = ranking
                .iter()
                .map(|entry| display_category(&entry.category).chars().count())
                .max()
                .unwrap_or(0)
                .max(dimension.column().len());
            for (rank, entry) in ranking.iter().enumerate() {
                writeln!(
                    w,
                    "  {:>2}. {:<name_width$}  {:>10}",
                    rank + 1,
                    display_category(&entry.category),
                    entry.qtd
                )?;
            }
            writeln!(w)?;
            writeln!(w, "  {:<10}  {:<name_width$}  {:>10}", "dia", dimension.column(), "qtd")?;
            for row in daily {
                writeln!(
                    w,
                    "  {:<10}  {:<name_width$}  {:>10}",
                    row.dia,
                    display_category(&row.category),
                    row.qtd
                )?;
            }
        }
    }
    pretty_rule(w)
}

fn render_kpi_pretty(kpi: &Kpi, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "Total", kpi.total.to_string())?;
    pretty_kv(w, "Errors", format!("{} ({})", kpi.errors, pct(kpi.error_pct)))?;
    pretty_kv(w, "Success", format!("{} ({})", kpi.success, pct(kpi.success_pct)))
}

fn display_category(category: &str) -> &str {
    if category.is_empty() { "(blank)" } else { category }
}
