//! One render pass: reference day, then KPIs and both breakdowns for each
//! requested window.

use crate::aggregate::{
    BreakdownDimension, DEFAULT_TOP_N, DailyStatusTotal, Kpi, TopErrors, daily_status_totals,
    top_error_categories,
};
use crate::classify::ErrorClassifier;
use crate::model::IntegrationRecord;
use crate::window::{Window, WindowView, reference_day};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Knobs for [`build_dashboard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub top_n: usize,
    pub dimension: BreakdownDimension,
    /// Windows to compute, in output order.
    pub windows: Vec<Window>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            dimension: BreakdownDimension::Category,
            windows: Window::ALL.to_vec(),
        }
    }
}

/// Result of a render pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardOutcome {
    /// No record carries a valid date; nothing else is computed.
    NoData,
    Ready(Dashboard),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub reference_day: NaiveDate,
    pub windows: Vec<WindowReport>,
}

impl Dashboard {
    /// Report for `window`, if it was requested.
    #[must_use]
    pub fn window(&self, window: Window) -> Option<&WindowReport> {
        self.windows.iter().find(|w| w.window == window)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub window: Window,
    pub label: &'static str,
    pub start_day: NaiveDate,
    pub end_day: NaiveDate,
    pub summary: WindowSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WindowSummary {
    /// The window holds no rows.
    Empty,
    Populated {
        kpi: Kpi,
        by_status: Vec<DailyStatusTotal>,
        top_errors: TopErrors,
    },
}

impl WindowSummary {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub const fn kpi(&self) -> Option<&Kpi> {
        match self {
            Self::Empty => None,
            Self::Populated { kpi, .. } => Some(kpi),
        }
    }
}

/// Compute every requested window over the full dataset.
#[must_use]
pub fn build_dashboard(
    records: &[IntegrationRecord],
    classifier: &dyn ErrorClassifier,
    options: &DashboardOptions,
) -> DashboardOutcome {
    let Some(reference_day) = reference_day(records) else {
        debug!("dataset has no dated rows");
        return DashboardOutcome::NoData;
    };

    let windows = options
        .windows
        .iter()
        .map(|&window| {
            let view = WindowView::new(records, window, reference_day);
            build_window_report(&view, classifier, options)
        })
        .collect();

    DashboardOutcome::Ready(Dashboard {
        reference_day,
        windows,
    })
}

/// Report for a single window view.
#[must_use]
pub fn build_window_report(
    view: &WindowView<'_>,
    classifier: &dyn ErrorClassifier,
    options: &DashboardOptions,
) -> WindowReport {
    let summary = if view.is_empty() {
        WindowSummary::Empty
    } else {
        WindowSummary::Populated {
            kpi: Kpi::compute(&view.records, classifier),
            by_status: daily_status_totals(&view.records),
            top_errors: top_error_categories(
                &view.records,
                classifier,
                options.dimension,
                options.top_n,
            ),
        }
    };

    debug!(
        window = view.window.slug(),
        rows = view.records.len(),
        "computed window report"
    );

    WindowReport {
        window: view.window,
        label: view.window.label(),
        start_day: view.start_day,
        end_day: view.reference_day,
        summary,
    }
}
