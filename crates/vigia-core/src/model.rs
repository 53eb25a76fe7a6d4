//! Normalized integration records and their store key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count column.
pub const COL_COUNT: &str = "qtd";
/// Status column.
pub const COL_STATUS: &str = "status";
/// Event date column.
pub const COL_EVENT_DATE: &str = "data_integracao";
/// Category column.
pub const COL_CATEGORY: &str = "tipo";
/// Hierarchy column tracked by the parent-type variant.
pub const COL_PARENT_TYPE: &str = "parent_type";
/// Qualified name some upstream joins emit for [`COL_PARENT_TYPE`].
pub const ALIAS_PARENT_TYPE: &str = "sis.parent_type";
/// Derived calendar-day column used by every aggregated table.
pub const COL_DAY: &str = "dia";

/// One aggregated integration row after normalization.
///
/// Serialized field names match the input column names so JSON output and
/// CSV exports share one vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegrationRecord {
    pub status: String,
    #[serde(rename = "data_integracao")]
    pub event_date: NaiveDate,
    #[serde(rename = "tipo")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    #[serde(rename = "qtd")]
    pub count: u64,
}

impl IntegrationRecord {
    /// Build a record without a hierarchy field.
    #[must_use]
    pub fn new(
        status: impl Into<String>,
        event_date: NaiveDate,
        category: impl Into<String>,
        count: u64,
    ) -> Self {
        Self {
            status: status.into(),
            event_date,
            category: category.into(),
            parent_type: None,
            count,
        }
    }

    /// Attach a hierarchy field.
    #[must_use]
    pub fn with_parent_type(mut self, parent_type: impl Into<String>) -> Self {
        self.parent_type = Some(parent_type.into());
        self
    }

    /// Calendar day of the event. Dates never carry a time of day, so this
    /// is the event date itself.
    #[must_use]
    pub const fn day(&self) -> NaiveDate {
        self.event_date
    }

    /// Composite store key. A blank hierarchy field keys the same as a
    /// missing one, matching how the store persists it.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            status: self.status.clone(),
            event_date: self.event_date,
            category: self.category.clone(),
            parent_type: self.parent_type.clone().filter(|p| !p.is_empty()),
        }
    }
}

/// Unique identity of a store row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub status: String,
    pub event_date: NaiveDate,
    pub category: String,
    pub parent_type: Option<String>,
}

impl RecordKey {
    fn into_record(self, count: u64) -> IntegrationRecord {
        IntegrationRecord {
            status: self.status,
            event_date: self.event_date,
            category: self.category,
            parent_type: self.parent_type,
            count,
        }
    }
}

/// Collapse records sharing a key into one row whose count is the sum.
///
/// Output is sorted by key, so the result does not depend on input order.
/// Sums saturate at `u64::MAX`.
#[must_use]
pub fn merge_by_key(records: &[IntegrationRecord]) -> Vec<IntegrationRecord> {
    let mut merged: BTreeMap<RecordKey, u64> = BTreeMap::new();
    for record in records {
        let total = merged.entry(record.key()).or_insert(0);
        *total = total.saturating_add(record.count);
    }
    merged
        .into_iter()
        .map(|(key, count)| key.into_record(count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    #[test]
    fn merge_sums_duplicate_keys() {
        let records = vec![
            IntegrationRecord::new("sucesso", day("2024-01-01"), "X", 10),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 5),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 5),
        ];

        let merged = merge_by_key(&records);
        assert_eq!(merged.len(), 2);
        let erro = merged
            .iter()
            .find(|r| r.status == "erro")
            .expect("erro row present");
        assert_eq!(erro.count, 10);
    }

    #[test]
    fn merge_keeps_parent_type_in_key() {
        let records = vec![
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 1).with_parent_type("A"),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 2).with_parent_type("B"),
        ];
        assert_eq!(merge_by_key(&records).len(), 2);
    }

    #[test]
    fn blank_parent_type_merges_with_missing() {
        let records = vec![
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 1).with_parent_type(""),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 2),
        ];
        let merged = merge_by_key(&records);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].count, 3);
        assert!(merged[0].parent_type.is_none());
    }

    #[test]
    fn merge_is_case_sensitive_on_status() {
        let records = vec![
            IntegrationRecord::new("Erro", day("2024-01-01"), "X", 1),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 2),
        ];
        assert_eq!(merge_by_key(&records).len(), 2);
    }

    #[test]
    fn merge_saturates_instead_of_overflowing() {
        let records = vec![
            IntegrationRecord::new("erro", day("2024-01-01"), "X", u64::MAX),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 1),
        ];
        assert_eq!(merge_by_key(&records)[0].count, u64::MAX);
    }

    #[test]
    fn serialized_names_match_columns() {
        let record = IntegrationRecord::new("ok", day("2024-02-03"), "nfe", 4);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["qtd"], 4);
        assert_eq!(json["tipo"], "nfe");
        assert_eq!(json["data_integracao"], "2024-02-03");
        assert!(json.get("parent_type").is_none());
    }
}
