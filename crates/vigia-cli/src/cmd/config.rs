//! `vg config`: inspect and edit project and user settings.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use toml::Value;
use vigia_core::config::{EffectiveConfig, project_config_path, resolve_config, user_config_path};
use vigia_core::normalize::SchemaVariant;

use crate::output::OutputMode;

/// Arguments for `vg config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show resolved or raw configuration
    Show(ShowArgs),
    /// Set a configuration key in project or user scope
    Set(SetArgs),
    /// Unset a configuration key in project or user scope
    Unset(UnsetArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Show raw project config only
    #[arg(long, conflicts_with = "user")]
    project: bool,

    /// Show raw user config only
    #[arg(long)]
    user: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Dot path key (e.g. ingest.variant, report.top_n, user.output)
    key: String,

    /// New value; lists are comma-separated
    value: String,
}

#[derive(Args, Debug)]
struct UnsetArgs {
    /// Scope to mutate
    #[arg(long, default_value = "project")]
    scope: ConfigScope,

    /// Dot path key (e.g. ingest.variant, report.top_n, user.output)
    key: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ConfigScope {
    Project,
    User,
}

/// Execute `vg config`.
///
/// # Errors
///
/// Returns an error for unknown keys, values of the wrong type, or config
/// files that cannot be read or written.
pub fn run_config(args: &ConfigArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    match &args.command {
        ConfigCommand::Show(show) => run_show(show, project_root, output),
        ConfigCommand::Set(set) => run_set(set, project_root, output),
        ConfigCommand::Unset(unset) => run_unset(unset, project_root, output),
    }
}

fn run_show(args: &ShowArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    if args.project || args.user {
        let path = if args.project {
            project_config_path(project_root)
        } else {
            user_path()?
        };
        let value = load_toml_table(&path)?;
        print_toml_or_json(&value, output)?;
        return Ok(());
    }

    let effective = resolve_config(project_root, output.is_json())?;
    print_effective(&effective, output)
}

fn run_set(args: &SetArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = scope_path(args.scope, project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_set(&mut value, args.scope, &args.key, &args.value)?;
    write_toml_table(&path, &value)?;
    render_mutation(output, "set", args.scope, &args.key)
}

fn run_unset(args: &UnsetArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let path = scope_path(args.scope, project_root)?;
    let mut value = load_toml_table(&path)?;
    apply_unset(&mut value, args.scope, &args.key)?;
    write_toml_table(&path, &value)?;
    render_mutation(output, "unset", args.scope, &args.key)
}

fn scope_path(scope: ConfigScope, project_root: &Path) -> Result<PathBuf> {
    match scope {
        ConfigScope::Project => Ok(project_config_path(project_root)),
        ConfigScope::User => user_path(),
    }
}

fn user_path() -> Result<PathBuf> {
    user_config_path().ok_or_else(|| anyhow!("Unable to resolve user config directory"))
}

fn apply_set(root: &mut Value, scope: ConfigScope, key: &str, raw: &str) -> Result<()> {
    let parsed = parse_value(scope, key, raw)?;
    let (section, leaf) = split_known_key(scope, key)?;

    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    // User config is flat; project config is sectioned.
    if scope == ConfigScope::User {
        table.insert(leaf.to_string(), parsed);
        return Ok(());
    }

    let section_table = table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(toml::map::Map::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("Section {section} must be a TOML table"))?;

    section_table.insert(leaf.to_string(), parsed);
    Ok(())
}

fn apply_unset(root: &mut Value, scope: ConfigScope, key: &str) -> Result<()> {
    let (section, leaf) = split_known_key(scope, key)?;
    let table = root
        .as_table_mut()
        .ok_or_else(|| anyhow!("Config root must be a TOML table"))?;

    if scope == ConfigScope::User {
        table.remove(leaf);
        return Ok(());
    }

    if let Some(section_entry) = table.get_mut(section)
        && let Some(section_table) = section_entry.as_table_mut()
    {
        section_table.remove(leaf);
        if section_table.is_empty() {
            table.remove(section);
        }
    }

    Ok(())
}

fn split_known_key(scope: ConfigScope, key: &str) -> Result<(&str, &str)> {
    let (section, leaf) = key
        .split_once('.')
        .ok_or_else(|| anyhow!("Key must use section.key format"))?;

    let valid = match scope {
        ConfigScope::Project => matches!(
            (section, leaf),
            ("ingest", "variant" | "day_first")
                | ("classify", "error_statuses" | "partial_success")
                | ("report", "top_n")
                | ("store", "path")
        ),
        ConfigScope::User => matches!((section, leaf), ("user", "output")),
    };

    if valid {
        Ok((section, leaf))
    } else {
        bail!("Unsupported key `{key}` for {} scope", scope_label(scope));
    }
}

fn parse_value(scope: ConfigScope, key: &str, raw: &str) -> Result<Value> {
    let (section, leaf) = split_known_key(scope, key)?;

    match (section, leaf) {
        ("ingest", "variant") => {
            let variant: SchemaVariant = raw.parse().map_err(|err| anyhow!("{key}: {err}"))?;
            Ok(Value::String(variant.as_str().to_string()))
        }
        ("user", "output") => match raw.trim().to_ascii_lowercase().as_str() {
            mode @ ("pretty" | "text" | "json") => Ok(Value::String(mode.to_string())),
            _ => bail!("{key} expects pretty, text, or json"),
        },
        ("store", "path") => {
            if raw.trim().is_empty() {
                bail!("{key} expects a non-empty path");
            }
            Ok(Value::String(raw.to_string()))
        }
        ("report", "top_n") => {
            let number: u32 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} expects a positive integer"))?;
            if number == 0 {
                bail!("{key} must be at least 1");
            }
            Ok(Value::Integer(i64::from(number)))
        }
        ("classify", "error_statuses") => {
            let statuses: Vec<Value> = raw
                .split(',')
                .map(str::trim)
                .filter(|status| !status.is_empty())
                .map(|status| Value::String(status.to_lowercase()))
                .collect();
            if statuses.is_empty() {
                bail!("{key} expects at least one status; use `vg config unset {key}` to clear");
            }
            Ok(Value::Array(statuses))
        }
        _ => {
            let value: bool = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} expects true or false"))?;
            Ok(Value::Boolean(value))
        }
    }
}

fn load_toml_table(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Table(toml::map::Map::new()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    if !value.is_table() {
        bail!("{} must contain a top-level TOML table", path.display());
    }

    Ok(value)
}

fn write_toml_table(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let serialized = toml::to_string_pretty(value)?;
    std::fs::write(path, serialized).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_toml_or_json(value: &Value, output: OutputMode) -> Result<()> {
    match output {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputMode::Text | OutputMode::Pretty => print!("{}", toml::to_string_pretty(value)?),
    }
    Ok(())
}

fn print_effective(value: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let project = &value.project;
    let store_path = project
        .store
        .path
        .as_ref()
        .map(|path| path.display().to_string());

    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputMode::Text => {
            println!("resolved_output={}", value.resolved_output);
            println!("ingest.variant={}", project.ingest.variant);
            println!("ingest.day_first={}", project.ingest.day_first);
            println!(
                "classify.error_statuses={}",
                project.classify.error_statuses.join(",")
            );
            println!(
                "classify.partial_success={}",
                project.classify.partial_success
            );
            println!("report.top_n={}", project.report.top_n);
            if let Some(path) = &store_path {
                println!("store.path={path}");
            }
            if let Some(out) = &value.user.output {
                println!("user.output={out}");
            }
        }
        OutputMode::Pretty => {
            println!("resolved_output = \"{}\"", value.resolved_output);
            println!();
            println!("[ingest]");
            println!("variant = \"{}\"", project.ingest.variant);
            println!("day_first = {}", project.ingest.day_first);
            println!();
            println!("[classify]");
            println!(
                "error_statuses = {:?}",
                project.classify.error_statuses
            );
            println!("partial_success = {}", project.classify.partial_success);
            println!();
            println!("[report]");
            println!("top_n = {}", project.report.top_n);
            println!();
            println!("[store]");
            if let Some(path) = &store_path {
                println!("path = \"{path}\"");
            }
            println!();
            println!("[user]");
            if let Some(out) = &value.user.output {
                println!("output = \"{out}\"");
            }
        }
    }

    Ok(())
}

fn render_mutation(output: OutputMode, action: &str, scope: ConfigScope, key: &str) -> Result<()> {
    let scope = scope_label(scope);
    match output {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "ok": true,
                    "action": action,
                    "scope": scope,
                    "key": key,
                }))?
            );
        }
        OutputMode::Text => {
            println!("ok=true action={action} scope={scope} key={key}");
        }
        OutputMode::Pretty => {
            let title = if action == "set" { "Set" } else { "Unset" };
            println!("{title} {key} in {scope} config");
        }
    }
    Ok(())
}

const fn scope_label(scope: ConfigScope) -> &'static str {
    match scope {
        ConfigScope::Project => "project",
        ConfigScope::User => "user",
    }
}
