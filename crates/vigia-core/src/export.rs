//! Delimited-text export of the tables a report produces.
//!
//! Column names are the internal ones (`dia`, `status`, `qtd`, `tipo`, ...)
//! so an exported file can be fed back into other tooling without a mapping.

use crate::aggregate::{BreakdownDimension, DailyCategoryTotal, DailyStatusTotal};
use crate::error::ExportError;
use crate::model::{
    COL_CATEGORY, COL_COUNT, COL_DAY, COL_EVENT_DATE, COL_PARENT_TYPE, COL_STATUS,
    IntegrationRecord,
};
use crate::normalize::SchemaVariant;
use crate::window::Window;
use std::fmt;
use std::io::Write;

/// Default field delimiter for exports.
pub const DEFAULT_EXPORT_DELIMITER: u8 = b',';

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tables that can be exported for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportTable {
    /// Daily totals per status.
    ByStatus,
    /// Daily totals of the top error categories.
    TopErrors,
    /// The window's rows as stored.
    Rows,
}

impl ExportTable {
    pub const ALL: [Self; 3] = [Self::ByStatus, Self::TopErrors, Self::Rows];

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::ByStatus => "by_status",
            Self::TopErrors => "top_errors",
            Self::Rows => "rows",
        }
    }

    /// `<table>_<window>.csv`
    #[must_use]
    pub fn file_name(self, window: Window) -> String {
        format!("{}_{}.csv", self.slug(), window.slug())
    }
}

impl fmt::Display for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

fn writer<W: Write>(out: W, delimiter: u8) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(delimiter).from_writer(out)
}

/// Write `dia,status,qtd`.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_status_totals<W: Write>(
    out: W,
    rows: &[DailyStatusTotal],
    delimiter: u8,
) -> Result<(), ExportError> {
    let mut wtr = writer(out, delimiter);
    wtr.write_record([COL_DAY, COL_STATUS, COL_COUNT])?;
    for row in rows {
        wtr.write_record([
            row.dia.format(DATE_FORMAT).to_string(),
            row.status.clone(),
            row.qtd.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `dia,<tipo|parent_type>,qtd`.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_category_totals<W: Write>(
    out: W,
    rows: &[DailyCategoryTotal],
    dimension: BreakdownDimension,
    delimiter: u8,
) -> Result<(), ExportError> {
    let mut wtr = writer(out, delimiter);
    wtr.write_record([COL_DAY, dimension.column(), COL_COUNT])?;
    for row in rows {
        wtr.write_record([
            row.dia.format(DATE_FORMAT).to_string(),
            row.category.clone(),
            row.qtd.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the window's rows as
/// `qtd,status,data_integracao,tipo[,parent_type],dia`, sorted by day,
/// status, category and parent type.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_window_rows<W: Write>(
    out: W,
    records: &[&IntegrationRecord],
    variant: SchemaVariant,
    delimiter: u8,
) -> Result<(), ExportError> {
    let with_parent = variant.tracks_parent_type();
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        a.day()
            .cmp(&b.day())
            .then_with(|| a.status.cmp(&b.status))
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.parent_type.cmp(&b.parent_type))
    });

    let mut header = vec![COL_COUNT, COL_STATUS, COL_EVENT_DATE, COL_CATEGORY];
    if with_parent {
        header.push(COL_PARENT_TYPE);
    }
    header.push(COL_DAY);

    let mut wtr = writer(out, delimiter);
    wtr.write_record(&header)?;
    for r in sorted {
        let date = r.event_date.format(DATE_FORMAT).to_string();
        let mut fields = vec![
            r.count.to_string(),
            r.status.clone(),
            date.clone(),
            r.category.clone(),
        ];
        if with_parent {
            fields.push(r.parent_type.clone().unwrap_or_default());
        }
        fields.push(date);
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<(), ExportError>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("export");
        String::from_utf8(buf).expect("utf-8")
    }

    #[test]
    fn status_totals_use_internal_names() {
        let rows = vec![DailyStatusTotal {
            dia: day("2024-01-01"),
            status: "erro".into(),
            qtd: 10,
        }];
        let out = render(|buf| write_status_totals(buf, &rows, DEFAULT_EXPORT_DELIMITER));
        assert_eq!(out, "dia,status,qtd\n2024-01-01,erro,10\n");
    }

    #[test]
    fn category_header_follows_dimension() {
        let rows = vec![DailyCategoryTotal {
            dia: day("2024-01-01"),
            category: "fiscal".into(),
            qtd: 3,
        }];
        let out = render(|buf| {
            write_category_totals(buf, &rows, BreakdownDimension::ParentType, b';')
        });
        assert_eq!(out, "dia;parent_type;qtd\n2024-01-01;fiscal;3\n");
    }

    #[test]
    fn window_rows_are_sorted_and_carry_day() {
        let records = [
            IntegrationRecord::new("ok", day("2024-01-02"), "b", 1),
            IntegrationRecord::new("erro", day("2024-01-02"), "a", 2),
            IntegrationRecord::new("ok", day("2024-01-01"), "a", 3),
        ];
        let refs: Vec<_> = records.iter().collect();
        let out = render(|buf| {
            write_window_rows(buf, &refs, SchemaVariant::Basic, DEFAULT_EXPORT_DELIMITER)
        });
        assert_eq!(
            out,
            "qtd,status,data_integracao,tipo,dia\n\
             3,ok,2024-01-01,a,2024-01-01\n\
             2,erro,2024-01-02,a,2024-01-02\n\
             1,ok,2024-01-02,b,2024-01-02\n"
        );
    }

    #[test]
    fn parent_type_variant_adds_column() {
        let records = [IntegrationRecord::new("ok", day("2024-01-01"), "nfe", 1).with_parent_type("fiscal")];
        let refs: Vec<_> = records.iter().collect();
        let out = render(|buf| {
            write_window_rows(buf, &refs, SchemaVariant::ParentType, DEFAULT_EXPORT_DELIMITER)
        });
        assert!(out.starts_with("qtd,status,data_integracao,tipo,parent_type,dia\n"));
        assert!(out.contains("1,ok,2024-01-01,nfe,fiscal,2024-01-01"));
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let rows = vec![DailyStatusTotal {
            dia: day("2024-01-01"),
            status: "erro, timeout".into(),
            qtd: 1,
        }];
        let out = render(|buf| write_status_totals(buf, &rows, DEFAULT_EXPORT_DELIMITER));
        assert!(out.contains("\"erro, timeout\""));
    }

    #[test]
    fn file_names_combine_table_and_window() {
        assert_eq!(ExportTable::ByStatus.file_name(Window::Today), "by_status_today.csv");
        assert_eq!(ExportTable::TopErrors.file_name(Window::Last7Days), "top_errors_7d.csv");
        assert_eq!(ExportTable::Rows.file_name(Window::Last30Days), "rows_30d.csv");
    }
}
