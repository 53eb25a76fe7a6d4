pub mod completions;
pub mod config;
pub mod errors;
pub mod export;
pub mod ingest;
pub mod report;

use anyhow::Result;
use std::path::{Path, PathBuf};
use vigia_core::config::{ProjectConfig, load_project_config};
use vigia_core::db::{ReplaceInfo, try_open_store};
use vigia_core::normalize::SchemaVariant;
use vigia_core::error::ErrorCode;

use crate::output::{CliError, OutputMode, render_error};

/// Resolved project state shared by the data commands.
#[derive(Debug)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub store_path: PathBuf,
}

impl ProjectContext {
    /// Load `.vigia/config.toml` under `root`; `db_override` wins over
    /// `store.path`.
    ///
    /// # Errors
    ///
    /// Renders and returns an error if the project config cannot be parsed.
    pub fn load(root: &Path, db_override: Option<&Path>, output: OutputMode) -> Result<Self> {
        let config = match load_project_config(root) {
            Ok(config) => config,
            Err(err) => {
                render_error(
                    output,
                    &CliError::with_code(format!("{err:#}"), ErrorCode::ConfigParseError),
                )?;
                return Err(err);
            }
        };

        let store_path = db_override.map_or_else(
            || config.store_path(root),
            |path| {
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                }
            },
        );

        Ok(Self {
            root: root.to_path_buf(),
            config,
            store_path,
        })
    }

    /// Metadata of the snapshot in the store, if one was uploaded.
    pub fn last_upload(&self) -> Option<ReplaceInfo> {
        try_open_store(&self.store_path).and_then(|store| store.last_replace().ok().flatten())
    }

    /// Variant the stored rows were ingested with, else `ingest.variant`.
    pub fn stored_variant(&self, last_upload: Option<&ReplaceInfo>) -> SchemaVariant {
        last_upload
            .and_then(ReplaceInfo::schema_variant)
            .unwrap_or(self.config.ingest.variant)
    }
}
