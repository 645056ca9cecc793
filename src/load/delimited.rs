// src/load/delimited.rs

use csv::{ByteRecord, ReaderBuilder};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::debug;

use super::clean::{clean_str, dedupe_headers, sniff_delimiter};
use super::{io_error, RawTable};
use crate::{dataset::DatasetKind, error::LoadError};

/// Read an INSEE delimited file into headers + non-empty rows.
///
/// The delimiter is sniffed from the header line; a row whose width differs
/// from the header is a schema mismatch rather than a parse error.
pub(crate) fn read_csv(kind: DatasetKind, path: &Path) -> Result<RawTable, LoadError> {
    // 1) Sniff the delimiter from the raw header line
    let mut first_line = Vec::new();
    BufReader::new(File::open(path).map_err(io_error(kind, path))?)
        .read_until(b'\n', &mut first_line)
        .map_err(io_error(kind, path))?;
    let header_line = String::from_utf8_lossy(&first_line);
    if header_line.trim().is_empty() {
        return Err(LoadError::schema(kind, path, "file is empty"));
    }
    let delimiter = sniff_delimiter(&header_line);

    // 2) Re-open and stream records; flexible so we can report widths ourselves
    let file = File::open(path).map_err(io_error(kind, path))?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));
    let csv_error = |source| LoadError::Csv {
        dataset: kind,
        path: path.to_path_buf(),
        source,
    };

    let headers: Vec<String> = rdr
        .byte_headers()
        .map_err(csv_error)?
        .iter()
        .map(|field| clean_str(&String::from_utf8_lossy(field)))
        .collect();
    if headers.len() < 2 {
        return Err(LoadError::schema(
            kind,
            path,
            "header has a single column; expected ';' or ',' separated fields",
        ));
    }
    let headers = dedupe_headers(headers);

    // 3) Collect rows, skipping fully blank ones
    let mut rows = Vec::with_capacity(kind.expected_rows());
    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record).map_err(csv_error)? {
        let row: Vec<String> = record
            .iter()
            .map(|field| clean_str(&String::from_utf8_lossy(field)))
            .collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        if row.len() != headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(LoadError::schema(
                kind,
                path,
                format!(
                    "line {}: {} fields, header has {}",
                    line,
                    row.len(),
                    headers.len()
                ),
            ));
        }
        rows.push(row);
    }

    debug!(
        rows = rows.len(),
        columns = headers.len(),
        delimiter = %(delimiter as char),
        "parsed csv"
    );
    Ok(RawTable { headers, rows })
}
