//! `vg export`: write report tables as delimited text.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vigia_core::aggregate::{TopErrors, daily_status_totals, top_error_categories};
use vigia_core::db::load_all_or_empty;
use vigia_core::error::{ErrorCode, ExportError};
use vigia_core::export::{
    DEFAULT_EXPORT_DELIMITER, ExportTable, write_category_totals, write_status_totals,
    write_window_rows,
};
use vigia_core::model::IntegrationRecord;
use vigia_core::normalize::SchemaVariant;
use vigia_core::window::{Window, WindowView, reference_day};

use super::ProjectContext;
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TableArg {
    /// Daily totals per status (`dia,status,qtd`).
    ByStatus,
    /// Daily totals of the ranked error categories.
    TopErrors,
    /// Raw window rows.
    Rows,
}

impl From<TableArg> for ExportTable {
    fn from(arg: TableArg) -> Self {
        match arg {
            TableArg::ByStatus => Self::ByStatus,
            TableArg::TopErrors => Self::TopErrors,
            TableArg::Rows => Self::Rows,
        }
    }
}

/// Arguments for `vg export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Table to export. Required unless `--dir` is given.
    #[arg(value_enum, required_unless_present = "dir")]
    pub table: Option<TableArg>,

    /// Window to export (`today`, `7d`, `30d`).
    #[arg(long, default_value = "today")]
    pub window: Window,

    /// Write to this file instead of stdout.
    #[arg(short, long, value_name = "FILE", conflicts_with = "dir")]
    pub output: Option<PathBuf>,

    /// Write every table for every window into this directory as
    /// `<table>_<window>.csv`.
    #[arg(long, value_name = "DIR", conflicts_with = "table")]
    pub dir: Option<PathBuf>,

    /// Field delimiter.
    #[arg(long, default_value_t = DEFAULT_EXPORT_DELIMITER as char)]
    pub delimiter: char,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    ok: bool,
    files: Vec<String>,
}

/// Execute `vg export`.
///
/// # Errors
///
/// Returns an error if the delimiter is not a single ASCII byte or writing
/// fails.
pub fn run_export(args: &ExportArgs, ctx: &ProjectContext, output: OutputMode) -> Result<()> {
    if !args.delimiter.is_ascii() {
        bail!("Delimiter must be a single ASCII character");
    }
    #[allow(clippy::cast_possible_truncation)]
    let delimiter = args.delimiter as u8;

    let records = load_all_or_empty(&ctx.store_path);
    let Some(reference) = reference_day(&records) else {
        warn!("store is empty, nothing to export");
        eprintln!("No data available. Upload an export with `vg ingest <file>` first.");
        return Ok(());
    };

    let exporter = Exporter {
        ctx,
        records: &records,
        reference,
        variant: ctx.stored_variant(ctx.last_upload().as_ref()),
        delimiter,
    };

    let result = match (&args.dir, args.table) {
        (Some(dir), _) => exporter.export_all(dir).and_then(|files| {
            let summary = ExportSummary { ok: true, files };
            render(output, &summary, |summary, w| {
                for file in &summary.files {
                    writeln!(w, "{file}")?;
                }
                Ok(())
            })
        }),
        (None, Some(table)) => {
            let table = ExportTable::from(table);
            match &args.output {
                Some(path) => exporter.export_to_file(table, args.window, path),
                None => {
                    let stdout = std::io::stdout();
                    exporter
                        .write_table(table, args.window, stdout.lock())
                        .map_err(anyhow::Error::from)
                }
            }
        }
        (None, None) => bail!("Pass a table to export or --dir"),
    };

    if let Err(err) = &result {
        render_error(
            output,
            &CliError::with_code(format!("{err:#}"), ErrorCode::ExportFailed),
        )?;
    }
    result
}

struct Exporter<'a> {
    ctx: &'a ProjectContext,
    records: &'a [IntegrationRecord],
    reference: NaiveDate,
    /// Column set of the stored rows.
    variant: SchemaVariant,
    delimiter: u8,
}

impl Exporter<'_> {
    fn write_table<W: Write>(
        &self,
        table: ExportTable,
        window: Window,
        out: W,
    ) -> Result<(), ExportError> {
        let view = WindowView::new(self.records, window, self.reference);
        let config = &self.ctx.config;
        match table {
            ExportTable::ByStatus => {
                write_status_totals(out, &daily_status_totals(&view.records), self.delimiter)
            }
            ExportTable::TopErrors => {
                let dimension = self.variant.breakdown();
                let daily = match top_error_categories(
                    &view.records,
                    &config.classifier(),
                    dimension,
                    config.report.top_n,
                ) {
                    TopErrors::NoErrors => Vec::new(),
                    TopErrors::Ranked { daily, .. } => daily,
                };
                write_category_totals(out, &daily, dimension, self.delimiter)
            }
            ExportTable::Rows => {
                write_window_rows(out, &view.records, self.variant, self.delimiter)
            }
        }
    }

    fn export_to_file(&self, table: ExportTable, window: Window, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_table(table, window, BufWriter::new(file))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), table = %table, window = %window, "exported table");
        Ok(())
    }

    fn export_all(&self, dir: &Path) -> Result<Vec<String>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut files = Vec::new();
        for window in Window::ALL {
            for table in ExportTable::ALL {
                let path = dir.join(table.file_name(window));
                self.export_to_file(table, window, &path)?;
                files.push(path.display().to_string());
            }
        }
        Ok(files)
    }
}
