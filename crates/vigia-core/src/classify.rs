//! Error classification of status strings.
//!
//! Aggregation code only sees [`ErrorClassifier`]; whether statuses are
//! matched by the built-in heuristic or by an operator-supplied allow-list is
//! decided once, when the classifier is built.

use crate::model::IntegrationRecord;
use serde::Serialize;
use std::collections::BTreeSet;

/// Substrings that mark a status as an error.
pub const ERROR_SUBSTRINGS: &[&str] = &["erro", "error", "fail"];
/// Exact statuses that mark an error.
pub const ERROR_TOKENS: &[&str] = &["nok", "falha", "failed"];
/// Status used by exports that track partial success.
pub const PARTIAL_SUCCESS_TOKEN: &str = "parcialmente integrado";

/// Predicate deciding whether a status denotes a failed integration.
pub trait ErrorClassifier {
    fn is_error(&self, status: &str) -> bool;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&str) -> bool,
{
    fn is_error(&self, status: &str) -> bool {
        self(status)
    }
}

/// Trimmed, lower-cased form used for every comparison.
#[must_use]
pub fn normalize_status(status: &str) -> String {
    status.trim().to_lowercase()
}

/// Default heuristic: error-like substrings or known failure tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeuristicClassifier {
    /// Also treat [`PARTIAL_SUCCESS_TOKEN`] as an error.
    pub partial_success: bool,
}

impl ErrorClassifier for HeuristicClassifier {
    fn is_error(&self, status: &str) -> bool {
        let s = normalize_status(status);
        ERROR_SUBSTRINGS.iter().any(|needle| s.contains(*needle))
            || ERROR_TOKENS.contains(&s.as_str())
            || (self.partial_success && s == PARTIAL_SUCCESS_TOKEN)
    }
}

/// Explicit set of error statuses. Replaces the heuristic entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowListClassifier {
    statuses: BTreeSet<String>,
}

impl AllowListClassifier {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            statuses: statuses
                .into_iter()
                .map(|s| normalize_status(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Normalized statuses, sorted.
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.statuses.iter().map(String::as_str)
    }
}

impl ErrorClassifier for AllowListClassifier {
    fn is_error(&self, status: &str) -> bool {
        self.statuses.contains(&normalize_status(status))
    }
}

/// Classifier selected from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusClassifier {
    Heuristic(HeuristicClassifier),
    AllowList(AllowListClassifier),
}

impl StatusClassifier {
    /// Allow-list when `explicit` holds at least one non-blank status,
    /// heuristic otherwise.
    pub fn from_settings<I, S>(explicit: I, partial_success: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allow = AllowListClassifier::new(explicit);
        if allow.is_empty() {
            Self::Heuristic(HeuristicClassifier { partial_success })
        } else {
            Self::AllowList(allow)
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ClassifierMode {
        match self {
            Self::Heuristic(_) => ClassifierMode::Heuristic,
            Self::AllowList(_) => ClassifierMode::AllowList,
        }
    }

    /// Normalized allow-list statuses; empty for the heuristic.
    #[must_use]
    pub fn error_statuses(&self) -> Vec<String> {
        match self {
            Self::Heuristic(_) => Vec::new(),
            Self::AllowList(a) => a.statuses().map(str::to_string).collect(),
        }
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::Heuristic(HeuristicClassifier::default())
    }
}

impl ErrorClassifier for StatusClassifier {
    fn is_error(&self, status: &str) -> bool {
        match self {
            Self::Heuristic(h) => h.is_error(status),
            Self::AllowList(a) => a.is_error(status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierMode {
    Heuristic,
    AllowList,
}

impl ClassifierMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::AllowList => "allow-list",
        }
    }
}

/// Distinct normalized statuses present in `records`, sorted.
#[must_use]
pub fn distinct_statuses(records: &[IntegrationRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| normalize_status(&r.status))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Statuses present in `records` that `classifier` flags, sorted. With the
/// heuristic this is the default offered to operators as an allow-list.
#[must_use]
pub fn suggest_error_statuses(
    records: &[IntegrationRecord],
    classifier: &dyn ErrorClassifier,
) -> Vec<String> {
    distinct_statuses(records)
        .into_iter()
        .filter(|s| classifier.is_error(s))
        .collect()
}
