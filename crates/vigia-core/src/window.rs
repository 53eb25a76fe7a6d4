//! Rolling day windows anchored at the dataset's most recent day.

use crate::model::IntegrationRecord;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed windows every report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Window {
    /// Only the reference day.
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
}

impl Window {
    pub const ALL: [Self; 3] = [Self::Today, Self::Last7Days, Self::Last30Days];

    /// Inclusive number of days covered.
    #[must_use]
    pub const fn day_count(self) -> u32 {
        match self {
            Self::Today => 1,
            Self::Last7Days => 7,
            Self::Last30Days => 30,
        }
    }

    /// Human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Today => "Today (latest day in dataset)",
            Self::Last7Days => "Last 7 days",
            Self::Last30Days => "Last 30 days",
        }
    }

    /// Short identifier for flags and file names.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Last7Days => "7d",
            Self::Last30Days => "30d",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" | "1d" => Ok(Self::Today),
            "7d" | "last-7-days" => Ok(Self::Last7Days),
            "30d" | "last-30-days" => Ok(Self::Last30Days),
            other => Err(format!("unknown window `{other}` (expected today, 7d or 30d)")),
        }
    }
}

/// The latest event date across the whole dataset, or `None` when empty.
#[must_use]
pub fn reference_day(records: &[IntegrationRecord]) -> Option<NaiveDate> {
    records.iter().map(|r| r.event_date).max()
}

/// First day of the inclusive range ending at `reference_day`.
///
/// Returns `None` for `day_count == 0` or when the start would precede the
/// representable calendar.
#[must_use]
pub fn window_start(reference_day: NaiveDate, day_count: u32) -> Option<NaiveDate> {
    let span = day_count.checked_sub(1)?;
    reference_day.checked_sub_days(Days::new(u64::from(span)))
}

/// Records whose day lies in `[reference_day - (day_count - 1), reference_day]`.
#[must_use]
pub fn select(
    records: &[IntegrationRecord],
    reference_day: NaiveDate,
    day_count: u32,
) -> Vec<&IntegrationRecord> {
    if day_count == 0 {
        return Vec::new();
    }
    let start = window_start(reference_day, day_count).unwrap_or(NaiveDate::MIN);
    records
        .iter()
        .filter(|r| r.day() >= start && r.day() <= reference_day)
        .collect()
}

/// Read-only slice of the dataset for one window of one render pass.
#[derive(Debug, Clone)]
pub struct WindowView<'a> {
    pub window: Window,
    pub reference_day: NaiveDate,
    pub start_day: NaiveDate,
    pub records: Vec<&'a IntegrationRecord>,
}

impl<'a> WindowView<'a> {
    #[must_use]
    pub fn new(records: &'a [IntegrationRecord], window: Window, reference_day: NaiveDate) -> Self {
        let day_count = window.day_count();
        Self {
            window,
            reference_day,
            start_day: window_start(reference_day, day_count).unwrap_or(NaiveDate::MIN),
            records: select(records, reference_day, day_count),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
