//! Schema normalization: raw delimited text to [`IntegrationRecord`]s.
//!
//! Column names are matched after trimming and lower-casing. Cell values are
//! kept verbatim except for `qtd` (coerced to a non-negative integer) and
//! `data_integracao` (parsed to a calendar date). Rows whose date does not
//! parse are dropped; the number dropped is only logged.

pub mod dates;
pub mod table;

use crate::aggregate::BreakdownDimension;
use crate::error::IngestError;
use crate::model::{
    ALIAS_PARENT_TYPE, COL_CATEGORY, COL_COUNT, COL_EVENT_DATE, COL_PARENT_TYPE, COL_STATUS,
    IntegrationRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub use dates::parse_event_date;
pub use table::{RawTable, detect_delimiter, parse_table, read_table};

/// Which deployment flavor of the export is being read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaVariant {
    /// `qtd, status, data_integracao, tipo`; errors broken down by `tipo`.
    #[default]
    Basic,
    /// Adds the `parent_type` hierarchy column; errors broken down by it.
    ParentType,
}

impl SchemaVariant {
    pub const ALL: [Self; 2] = [Self::Basic, Self::ParentType];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::ParentType => "parent-type",
        }
    }

    /// Columns that must be present after header normalization.
    #[must_use]
    pub const fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Basic => &[COL_COUNT, COL_STATUS, COL_EVENT_DATE, COL_CATEGORY],
            Self::ParentType => &[
                COL_COUNT,
                COL_STATUS,
                COL_EVENT_DATE,
                COL_CATEGORY,
                COL_PARENT_TYPE,
            ],
        }
    }

    #[must_use]
    pub const fn tracks_parent_type(self) -> bool {
        matches!(self, Self::ParentType)
    }

    /// Dimension used to rank error categories.
    #[must_use]
    pub const fn breakdown(self) -> BreakdownDimension {
        match self {
            Self::Basic => BreakdownDimension::Category,
            Self::ParentType => BreakdownDimension::ParentType,
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "parent-type" | "parent_type" => Ok(Self::ParentType),
            other => Err(format!(
                "unknown schema variant `{other}` (expected basic or parent-type)"
            )),
        }
    }
}

/// Turns raw input into records for one schema variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    pub variant: SchemaVariant,
    /// Read slash dates as `DD/MM/YYYY` instead of `MM/DD/YYYY`.
    pub day_first: bool,
}

impl Normalizer {
    #[must_use]
    pub const fn new(variant: SchemaVariant) -> Self {
        Self {
            variant,
            day_first: false,
        }
    }

    #[must_use]
    pub const fn day_first(mut self, day_first: bool) -> Self {
        self.day_first = day_first;
        self
    }

    /// Parse and normalize delimited text.
    ///
    /// # Errors
    ///
    /// Returns an [`IngestError`] if the text cannot be parsed or required
    /// columns are missing. An input whose rows all fail date parsing is not
    /// an error here; it yields an empty vector.
    pub fn normalize(&self, input: &str) -> Result<Vec<IntegrationRecord>, IngestError> {
        let table = read_table(input)?;
        self.normalize_table(&table)
    }

    /// Normalize an already parsed table.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MissingColumns`] listing every absent required
    /// column in alphabetical order.
    pub fn normalize_table(&self, table: &RawTable) -> Result<Vec<IntegrationRecord>, IngestError> {
        let headers = normalize_headers(&table.headers);
        let columns = self.locate_columns(&headers)?;

        let mut records = Vec::with_capacity(table.rows.len());
        let mut dropped = 0_usize;

        for row in &table.rows {
            let cell = |idx: usize| row.get(idx).map_or("", String::as_str);

            let Some(event_date) = parse_event_date(cell(columns.event_date), self.day_first)
            else {
                dropped += 1;
                continue;
            };

            records.push(IntegrationRecord {
                status: cell(columns.status).to_string(),
                event_date,
                category: cell(columns.category).to_string(),
                parent_type: columns.parent_type.map(|idx| cell(idx).to_string()),
                count: coerce_count(cell(columns.count)),
            });
        }

        debug!(
            variant = %self.variant,
            rows = table.rows.len(),
            kept = records.len(),
            dropped,
            "normalized input"
        );

        Ok(records)
    }

    fn locate_columns(&self, headers: &[String]) -> Result<ColumnIndexes, IngestError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: BTreeSet<&str> = self
            .variant
            .required_columns()
            .iter()
            .copied()
            .filter(|name| position(name).is_none())
            .collect();

        match (
            position(COL_COUNT),
            position(COL_STATUS),
            position(COL_EVENT_DATE),
            position(COL_CATEGORY),
        ) {
            (Some(count), Some(status), Some(event_date), Some(category)) if missing.is_empty() => {
                Ok(ColumnIndexes {
                    count,
                    status,
                    event_date,
                    category,
                    parent_type: if self.variant.tracks_parent_type() {
                        position(COL_PARENT_TYPE)
                    } else {
                        None
                    },
                })
            }
            _ => Err(IngestError::MissingColumns {
                missing: missing.into_iter().map(str::to_owned).collect(),
            }),
        }
    }
}

struct ColumnIndexes {
    count: usize,
    status: usize,
    event_date: usize,
    category: usize,
    parent_type: Option<usize>,
}

/// Trim and lower-case header names, then rename the qualified parent-type
/// alias when the canonical column is absent.
#[must_use]
pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    if !normalized.iter().any(|h| h == COL_PARENT_TYPE)
        && let Some(alias) = normalized.iter_mut().find(|h| *h == ALIAS_PARENT_TYPE)
    {
        COL_PARENT_TYPE.clone_into(alias);
    }

    normalized
}

/// Coerce a count cell: integers as-is, decimals truncated toward zero,
/// negatives and non-numeric values to 0.
#[must_use]
pub fn coerce_count(raw: &str) -> u64 {
    let value = raw.trim();
    if let Ok(n) = value.parse::<u64>() {
        return n;
    }
    if value.parse::<i64>().is_ok() {
        // Negative integer.
        return 0;
    }
    match value.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(n) if n.is_finite() && n > 0.0 => n.trunc() as u64,
        _ => 0,
    }
}
