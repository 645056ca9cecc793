// src/load/workbook.rs

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::debug;

use super::clean::{clean_str, dedupe_headers};
use super::RawTable;
use crate::{dataset::DatasetKind, error::LoadError};

/// Read the first worksheet of an Excel workbook into headers + non-empty rows.
pub(crate) fn read_xlsx(kind: DatasetKind, path: &Path) -> Result<RawTable, LoadError> {
    let xlsx_error = |source| LoadError::Xlsx {
        dataset: kind,
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(xlsx_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::schema(kind, path, "workbook has no worksheet"))?
        .map_err(xlsx_error)?;

    let mut cells = range.rows();
    let header_row = cells
        .next()
        .ok_or_else(|| LoadError::schema(kind, path, "first worksheet is empty"))?;
    let raw_headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
    if raw_headers.iter().all(String::is_empty) {
        return Err(LoadError::schema(kind, path, "header row is blank"));
    }
    let headers = dedupe_headers(raw_headers);

    // calamine ranges are rectangular, so every row has the header's width
    let mut rows = Vec::with_capacity(range.height());
    for row in cells {
        let row: Vec<String> = row.iter().map(cell_to_string).collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }

    debug!(rows = rows.len(), columns = headers.len(), "parsed workbook");
    Ok(RawTable { headers, rows })
}

/// Spreadsheet cell as text; integral floats lose their `.0`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => clean_str(s),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => clean_str(&other.to_string()),
    }
}
