//! Per-window aggregation: daily status totals, top-N error breakdown, KPIs.
//!
//! Every function here is order-independent: grouping goes through ordered
//! maps and every output has a total ordering with lexical tie-breaks.

use crate::classify::ErrorClassifier;
use crate::model::{COL_CATEGORY, COL_PARENT_TYPE, IntegrationRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of categories kept by the error breakdown unless configured.
pub const DEFAULT_TOP_N: usize = 8;

/// Field the error breakdown groups by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakdownDimension {
    #[default]
    Category,
    ParentType,
}

impl BreakdownDimension {
    /// Column name of the dimension in tables and exports.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Category => COL_CATEGORY,
            Self::ParentType => COL_PARENT_TYPE,
        }
    }

    /// Value of the dimension for one record. A missing hierarchy field
    /// groups under the empty string.
    #[must_use]
    pub fn value_of(self, record: &IntegrationRecord) -> &str {
        match self {
            Self::Category => &record.category,
            Self::ParentType => record.parent_type.as_deref().unwrap_or(""),
        }
    }
}

impl fmt::Display for BreakdownDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStatusTotal {
    pub dia: NaiveDate,
    pub status: String,
    pub qtd: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCategoryTotal {
    pub dia: NaiveDate,
    pub category: String,
    pub qtd: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub qtd: u64,
}

/// Result of the error breakdown for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TopErrors {
    /// The window holds no error rows at all.
    NoErrors,
    Ranked {
        dimension: BreakdownDimension,
        /// Top categories by total error count, highest first.
        ranking: Vec<CategoryTotal>,
        /// Daily totals for the ranked categories only.
        daily: Vec<DailyCategoryTotal>,
    },
}

impl TopErrors {
    #[must_use]
    pub const fn is_no_errors(&self) -> bool {
        matches!(self, Self::NoErrors)
    }
}

/// Headline numbers for a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpi {
    pub total: u64,
    pub errors: u64,
    pub success: u64,
    pub error_pct: f64,
    pub success_pct: f64,
}

impl Kpi {
    /// Sum counts, split by `classifier`. Percentages are 0 when the total
    /// is 0.
    #[must_use]
    pub fn compute(records: &[&IntegrationRecord], classifier: &dyn ErrorClassifier) -> Self {
        let (total, errors) = records.iter().fold((0_u64, 0_u64), |(total, errors), r| {
            let errors = if classifier.is_error(&r.status) {
                errors.saturating_add(r.count)
            } else {
                errors
            };
            (total.saturating_add(r.count), errors)
        });
        let success = total - errors;

        Self {
            total,
            errors,
            success,
            error_pct: percentage(errors, total),
            success_pct: percentage(success, total),
        }
    }
}

/// `part / total * 100`, with `total == 0` defined as 0.
#[must_use]
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = part as f64 / total as f64;
    ratio * 100.0
}

/// Group by (day, status) summing counts; ordered by day, then status.
#[must_use]
pub fn daily_status_totals(records: &[&IntegrationRecord]) -> Vec<DailyStatusTotal> {
    let mut groups: BTreeMap<(NaiveDate, &str), u64> = BTreeMap::new();
    for r in records {
        let total = groups.entry((r.day(), r.status.as_str())).or_insert(0);
        *total = total.saturating_add(r.count);
    }
    groups
        .into_iter()
        .map(|((dia, status), qtd)| DailyStatusTotal {
            dia,
            status: status.to_string(),
            qtd,
        })
        .collect()
}

/// Rank error categories by total over the whole window and keep the top
/// `n`; ties on the total are broken by category name ascending.
#[must_use]
pub fn rank_error_categories(
    records: &[&IntegrationRecord],
    classifier: &dyn ErrorClassifier,
    dimension: BreakdownDimension,
    n: usize,
) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for r in records.iter().filter(|r| classifier.is_error(&r.status)) {
        let total = totals.entry(dimension.value_of(r)).or_insert(0);
        *total = total.saturating_add(r.count);
    }

    let mut ranking: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, qtd)| CategoryTotal {
            category: category.to_string(),
            qtd,
        })
        .collect();
    ranking.sort_by(|a, b| b.qtd.cmp(&a.qtd).then_with(|| a.category.cmp(&b.category)));
    ranking.truncate(n);
    ranking
}

/// Error breakdown for a window: the top `n` categories and their daily
/// totals, ordered by day ascending, count descending, then category.
#[must_use]
pub fn top_error_categories(
    records: &[&IntegrationRecord],
    classifier: &dyn ErrorClassifier,
    dimension: BreakdownDimension,
    n: usize,
) -> TopErrors {
    let errors: Vec<&IntegrationRecord> = records
        .iter()
        .copied()
        .filter(|r| classifier.is_error(&r.status))
        .collect();
    if errors.is_empty() {
        return TopErrors::NoErrors;
    }

    let ranking = rank_error_categories(&errors, classifier, dimension, n);

    let mut groups: BTreeMap<(NaiveDate, &str), u64> = BTreeMap::new();
    for r in &errors {
        let category = dimension.value_of(r);
        if !ranking.iter().any(|c| c.category == category) {
            continue;
        }
        let total = groups.entry((r.day(), category)).or_insert(0);
        *total = total.saturating_add(r.count);
    }

    let mut daily: Vec<DailyCategoryTotal> = groups
        .into_iter()
        .map(|((dia, category), qtd)| DailyCategoryTotal {
            dia,
            category: category.to_string(),
            qtd,
        })
        .collect();
    daily.sort_by(|a, b| {
        a.dia
            .cmp(&b.dia)
            .then_with(|| b.qtd.cmp(&a.qtd))
            .then_with(|| a.category.cmp(&b.category))
    });

    TopErrors::Ranked {
        dimension,
        ranking,
        daily,
    }
}
