//! vigia-core library.
//!
//! Pipeline: delimited text → [`normalize`] → [`db::Store`] (replace with
//! merge) → full reload → [`window`] selection → [`aggregate`] per window,
//! driven end to end by [`dashboard::build_dashboard`].
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per concern ([`error`]); `anyhow::Result`
//!   for configuration loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod model;
pub mod normalize;
pub mod window;

pub use aggregate::{BreakdownDimension, Kpi, TopErrors};
pub use classify::{ErrorClassifier, StatusClassifier};
pub use dashboard::{DashboardOptions, DashboardOutcome, build_dashboard};
pub use error::{ErrorCode, IngestError, StoreError};
pub use model::IntegrationRecord;
pub use normalize::{Normalizer, SchemaVariant};
pub use window::Window;
