//! Reading the PL export
//!
//! The spreadsheet is exported as delimited text. Every cell is kept as a
//! string so PL numbers and BSNs keep their leading zeros.

use std::io::Read;
use std::path::Path;

use crate::common::config::LookupConfig;
use crate::common::{Error, Result};

use super::LookupRow;

/// Read the PL and BSN columns from the export at `path`
pub fn read_rows(path: &Path, options: &LookupConfig) -> Result<Vec<LookupRow>> {
    let file = std::fs::File::open(path).map_err(|e| Error::file_read(path, e))?;
    read_rows_from(file, options).map_err(|e| match e {
        Error::Lookup(msg) => Error::Lookup(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Read the PL and BSN columns from any reader
pub fn read_rows_from<R: Read>(reader: R, options: &LookupConfig) -> Result<Vec<LookupRow>> {
    if !options.delimiter.is_ascii() {
        return Err(Error::Lookup(format!(
            "delimiter '{}' must be a single ASCII character",
            options.delimiter
        )));
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter as u8)
        .from_reader(reader);

    let mut records = csv_reader.records().skip(options.skip_rows);

    let header = match records.next() {
        Some(record) => record.map_err(|e| Error::Lookup(e.to_string()))?,
        None => {
            return Err(Error::Lookup(format!(
                "no header row after skipping {} row(s)",
                options.skip_rows
            )))
        }
    };
    let headers: Vec<String> = header
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            Error::Lookup(format!(
                "column '{}' not found. Available: {:?}",
                name, headers
            ))
        })
    };
    let pl_idx = column(&options.pl_column)?;
    let bsn_idx = column(&options.bsn_column)?;

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| Error::Lookup(e.to_string()))?;
        let pl_number = record.get(pl_idx).unwrap_or("").trim();
        let bsn = record.get(bsn_idx).unwrap_or("").trim();
        if pl_number.is_empty() && bsn.is_empty() {
            continue;
        }
        rows.push(LookupRow::new(pl_number, bsn));
    }

    Ok(rows)
}
