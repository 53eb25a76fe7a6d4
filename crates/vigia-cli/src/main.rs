#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::ProjectContext;
use output::{OutputMode, resolve_output_mode};
use std::env;
use vigia_core::config::{UserConfig, load_user_config};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "vigia: integration event dashboards from CSV exports",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (overrides FORMAT and TTY detection).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output; shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Store file to use instead of `store.path`.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self, user_output: Option<&str>) -> OutputMode {
        resolve_output_mode(self.format, self.json, user_output)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Data",
        about = "Load a CSV export into the store",
        long_about = "Normalize a CSV export (comma or semicolon delimited) and replace the stored snapshot with its rows. The store is left untouched if the file fails validation.",
        after_help = "EXAMPLES:\n    # Load an export\n    vg ingest exports/integracoes.csv\n\n    # Read an export with a parent_type column and DD/MM/YYYY dates\n    vg ingest export.csv --variant parent-type --day-first\n\n    # Validate without writing\n    vg ingest export.csv --dry-run --json"
    )]
    Ingest(cmd::ingest::IngestArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the windowed dashboard",
        long_about = "Show KPIs, daily status volume, and the top error categories for the Today, Last 7 Days, and Last 30 Days windows. Windows end at the most recent day in the store.",
        after_help = "EXAMPLES:\n    # Full dashboard\n    vg report\n\n    # Only the last 7 days, top 3 categories\n    vg report --window 7d --top 3\n\n    # Emit machine-readable output\n    vg report --json"
    )]
    Report(cmd::report::ReportArgs),

    #[command(
        next_help_heading = "Read",
        about = "Inspect or override error classification",
        long_about = "List the statuses in the store and how each is classified, or replace the keyword heuristic with an explicit list of error statuses.",
        after_help = "EXAMPLES:\n    # Show statuses and the current classification\n    vg errors list\n\n    # Treat exactly these statuses as errors\n    vg errors set NOK rejeitado\n\n    # Go back to the heuristic\n    vg errors clear"
    )]
    Errors(cmd::errors::ErrorsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Export report tables as CSV",
        long_about = "Write the daily status totals, the ranked error breakdown, or the raw rows of one window as delimited text.",
        after_help = "EXAMPLES:\n    # Daily totals per status for today\n    vg export by-status\n\n    # Error breakdown for the last 30 days into a file\n    vg export top-errors --window 30d -o top_errors.csv\n\n    # Every table for every window\n    vg export --dir out/"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Configuration",
        about = "Inspect or edit configuration",
        long_about = "Show the effective configuration or set and unset keys in .vigia/config.toml or the per-user config file.",
        after_help = "EXAMPLES:\n    # Show resolved config\n    vg config show\n\n    # Read exports with a parent_type column\n    vg config set ingest.variant parent-type\n\n    # Prefer JSON output for this user\n    vg config set --scope user user.output json"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Configuration",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for bash, zsh, fish, elvish, or powershell.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    vg completions bash > ~/.local/share/bash-completion/completions/vg"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("VIGIA_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "vigia=debug,info"
        } else {
            "vigia=info,warn"
        })
    });

    let format = env::var("VIGIA_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = env::current_dir()?;
    let user = load_user_config().unwrap_or_else(|err| {
        warn!("ignoring user config: {err:#}");
        UserConfig::default()
    });
    let output = cli.output_mode(user.output.as_deref());
    debug!(root = %project_root.display(), ?output, "starting");

    let context = || -> anyhow::Result<ProjectContext> {
        let ctx = ProjectContext::load(&project_root, cli.db.as_deref(), output)?;
        debug!(store = %ctx.store_path.display(), "project loaded");
        Ok(ctx)
    };

    match &cli.command {
        Commands::Ingest(args) => cmd::ingest::run_ingest(args, &context()?, output, cli.quiet),
        Commands::Report(args) => cmd::report::run_report(args, &context()?, output),
        Commands::Errors(args) => cmd::errors::run_errors(args, &context()?, output),
        Commands::Export(args) => cmd::export::run_export(args, &context()?, output),
        Commands::Config(args) => cmd::config::run_config(args, &project_root, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
    }
}
