use crate::aggregate::DEFAULT_TOP_N;
use crate::classify::StatusClassifier;
use crate::dashboard::DashboardOptions;
use crate::db::DEFAULT_STORE_PATH;
use crate::normalize::{Normalizer, SchemaVariant};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Project-local state directory.
pub const CONFIG_DIR: &str = ".vigia";

/// Project config file, relative to the project root.
pub const PROJECT_CONFIG_FILE: &str = ".vigia/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub variant: SchemaVariant,
    /// Read ambiguous slash dates as `DD/MM/YYYY`.
    #[serde(default)]
    pub day_first: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Explicit error statuses. Empty means the heuristic decides.
    #[serde(default)]
    pub error_statuses: Vec<String>,
    #[serde(default)]
    pub partial_success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store file; relative paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ProjectConfig {
    #[must_use]
    pub fn classifier(&self) -> StatusClassifier {
        StatusClassifier::from_settings(
            &self.classify.error_statuses,
            self.classify.partial_success,
        )
    }

    #[must_use]
    pub const fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.ingest.variant).day_first(self.ingest.day_first)
    }

    #[must_use]
    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            top_n: self.report.top_n,
            dimension: self.ingest.variant.breakdown(),
            ..DashboardOptions::default()
        }
    }

    /// Store location: `store.path` if set, else `.vigia/vigia.db`.
    #[must_use]
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        match &self.store.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project_root.join(path),
            None => project_root.join(DEFAULT_STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.vigia/config.toml`, or defaults if it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_config_path(project_root);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `config` to `.vigia/config.toml`, creating the directory.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_project_config(project_root: &Path, config: &ProjectConfig) -> Result<()> {
    let path = project_config_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let serialized = toml::to_string_pretty(config)?;
    std::fs::write(&path, serialized)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(path) = user_config_path() else {
        return Ok(UserConfig::default());
    };
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_FILE)
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vigia/config.toml"))
}

/// Project and user config plus the output mode they resolve to.
///
/// # Errors
///
/// Returns an error if either config file fails to load.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" => Some("pretty"),
        "text" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
    is_tty: bool,
) -> String {
    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    let mode = if is_tty { "pretty" } else { "text" };
    mode.to_string()
}

const fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
