//! CSV candle loading
//!
//! Columns are located by header name, so order is free and extra columns are
//! ignored. Timestamps may be integers (kept as-is) or date strings, which are
//! converted to epoch milliseconds in UTC.

use std::{io, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::info;

use crate::{Candle, CandleSeries};

/// Columns every input file must carry
pub const REQUIRED_COLUMNS: [&str; 5] = ["timestamp", "open", "high", "low", "close"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}: cannot parse {column} from '{value}'")]
    Parse {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Read candles from any CSV source with a header row.
pub fn read_candles<R: io::Read>(reader: R) -> Result<CandleSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    };

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|&&name| position(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(DataError::MissingColumns(missing));
    }

    let mut columns = [0usize; 5];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = position(name).unwrap_or_default();
    }

    let mut candles = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let row = i + 2;
        let field = |k: usize| record.get(columns[k]).unwrap_or("");

        let price = |k: usize| {
            let raw = field(k);
            raw.parse::<f64>().map_err(|_| DataError::Parse {
                row,
                column: REQUIRED_COLUMNS[k],
                value: raw.to_string(),
            })
        };

        let raw_ts = field(0);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| DataError::Parse {
            row,
            column: "timestamp",
            value: raw_ts.to_string(),
        })?;

        candles.push(Candle::new(timestamp, price(1)?, price(2)?, price(3)?, price(4)?));
    }

    info!(candles = candles.len(), "loaded candles");
    Ok(CandleSeries::new(candles))
}

pub fn load_csv_str(text: &str) -> Result<CandleSeries, DataError> {
    read_candles(text.as_bytes())
}

pub fn load_csv(path: impl AsRef<Path>) -> Result<CandleSeries, DataError> {
    let file = std::fs::File::open(path.as_ref())?;
    read_candles(io::BufReader::new(file))
}

/// Integer timestamps pass through; RFC 3339, `%Y-%m-%d %H:%M:%S` and
/// `%Y-%m-%d` become epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
