//! Raw delimited-text parsing with delimiter sniffing.

use crate::error::IngestError;
use tracing::debug;

/// Delimiters considered by [`detect_delimiter`], in preference order.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Delimiter used when sniffing fails.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Number of non-blank lines (header included) inspected while sniffing.
const SNIFF_SAMPLE_LINES: usize = 20;

/// Header plus rows of untyped cells, exactly as read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// Guess the field delimiter from the first lines of `input`.
///
/// A candidate qualifies when it appears at least once in the header and the
/// same number of times (outside double quotes) on every sampled line. The
/// qualifying candidate with the most fields wins; ties go to the earlier
/// entry of [`CANDIDATE_DELIMITERS`].
///
/// # Errors
///
/// Returns [`IngestError::DelimiterUndetected`] when no candidate qualifies.
pub fn detect_delimiter(input: &str) -> Result<u8, IngestError> {
    let sample: Vec<&str> = strip_bom(input)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_SAMPLE_LINES)
        .collect();

    let Some((header, rest)) = sample.split_first() else {
        return Err(IngestError::DelimiterUndetected);
    };

    let mut best: Option<(u8, usize)> = None;
    for delimiter in CANDIDATE_DELIMITERS {
        let fields = count_unquoted(header, delimiter);
        if fields == 0 {
            continue;
        }
        if !rest
            .iter()
            .all(|line| count_unquoted(line, delimiter) == fields)
        {
            continue;
        }
        if best.is_none_or(|(_, best_fields)| fields > best_fields) {
            best = Some((delimiter, fields));
        }
    }

    best.map(|(delimiter, _)| delimiter)
        .ok_or(IngestError::DelimiterUndetected)
}

/// Parse `input` with a fixed delimiter. Every row must have as many fields
/// as the header; blank lines are skipped.
///
/// # Errors
///
/// Returns [`IngestError::CsvParse`] on malformed input.
pub fn parse_table(input: &str, delimiter: u8) -> Result<RawTable, IngestError> {
    let to_error = |source| IngestError::CsvParse {
        delimiter: char::from(delimiter),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(strip_bom(input).as_bytes());

    let headers = reader
        .headers()
        .map_err(to_error)?
        .iter()
        .map(str::to_owned)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(to_error)?;
        rows.push(record.iter().map(str::to_owned).collect());
    }

    Ok(RawTable { headers, rows })
}

/// Sniff the delimiter and parse; when either step fails, retry once with
/// [`DEFAULT_DELIMITER`].
///
/// # Errors
///
/// Returns the fallback parse error when both attempts fail.
pub fn read_table(input: &str) -> Result<RawTable, IngestError> {
    let sniffed = detect_delimiter(input).and_then(|delimiter| {
        debug!(delimiter = %char::from(delimiter).escape_default(), "detected delimiter");
        parse_table(input, delimiter)
    });

    match sniffed {
        Ok(table) => Ok(table),
        Err(error) => {
            debug!(%error, "sniffed parse failed, retrying with default delimiter");
            parse_table(input, DEFAULT_DELIMITER)
        }
    }
}

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{feff}').unwrap_or(input)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}
