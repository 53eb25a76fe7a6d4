use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for scripts and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingColumns,
    DelimiterUndetected,
    CsvParse,
    EmptyDataset,
    ConfigParseError,
    StoreUnavailable,
    StoreWriteFailed,
    CountOutOfRange,
    ExportFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingColumns => "E1001",
            Self::DelimiterUndetected => "E1002",
            Self::CsvParse => "E1003",
            Self::EmptyDataset => "E1004",
            Self::ConfigParseError => "E2001",
            Self::StoreUnavailable => "E3001",
            Self::StoreWriteFailed => "E3002",
            Self::CountOutOfRange => "E3003",
            Self::ExportFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingColumns => "Input is missing required columns",
            Self::DelimiterUndetected => "Field delimiter could not be detected",
            Self::CsvParse => "Delimited input could not be parsed",
            Self::EmptyDataset => "No valid rows",
            Self::ConfigParseError => "Config file parse error",
            Self::StoreUnavailable => "Store unavailable",
            Self::StoreWriteFailed => "Store write failed",
            Self::CountOutOfRange => "Count out of range",
            Self::ExportFailed => "Export failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingColumns => Some(
                "Export the query with the columns qtd, status, data_integracao and tipo \
                 (plus parent_type for the parent-type variant).",
            ),
            Self::DelimiterUndetected | Self::CsvParse => {
                Some("Check that every row has the same number of fields as the header.")
            }
            Self::EmptyDataset => {
                Some("Check that data_integracao holds dates such as 2024-01-31.")
            }
            Self::ConfigParseError => Some("Fix syntax in .vigia/config.toml and retry."),
            Self::StoreUnavailable => Some("Run `vg ingest <file>` to create the store."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::CountOutOfRange => Some("Counts must fit in a signed 64-bit integer."),
            Self::ExportFailed => Some("Check that the output directory is writable."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure of one ingestion attempt. Nothing is written when one of these
/// is returned.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Required columns are absent; `missing` is sorted alphabetically.
    #[error("input is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// No candidate delimiter splits the sampled lines consistently.
    #[error("could not detect the field delimiter")]
    DelimiterUndetected,

    /// Parsing with the given delimiter failed.
    #[error("failed to parse input with delimiter {delimiter:?}: {source}")]
    CsvParse {
        delimiter: char,
        #[source]
        source: csv::Error,
    },

    /// Every row was dropped (or the input had none).
    #[error("no rows with a valid data_integracao remain after normalization")]
    EmptyDataset,
}

impl IngestError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingColumns { .. } => ErrorCode::MissingColumns,
            Self::DelimiterUndetected => ErrorCode::DelimiterUndetected,
            Self::CsvParse { .. } => ErrorCode::CsvParse,
            Self::EmptyDataset => ErrorCode::EmptyDataset,
        }
    }
}

/// Store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database file could not be opened or configured.
    #[error("store at {} is unavailable: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The store directory could not be created.
    #[error("failed to create store directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A count does not fit in SQLite's signed integer column.
    #[error("count {count} for status {status:?} on {event_date} exceeds the storable range")]
    CountOutOfRange {
        status: String,
        event_date: chrono::NaiveDate,
        count: u64,
    },

    /// Any other SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable { .. } | Self::CreateDir { .. } => ErrorCode::StoreUnavailable,
            Self::CountOutOfRange { .. } => ErrorCode::CountOutOfRange,
            Self::Sqlite(_) => ErrorCode::StoreWriteFailed,
        }
    }
}

/// Export failure.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
