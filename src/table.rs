//! In-memory commune table shared by the loader, the cache and the profile
//! builder.

use std::collections::{BTreeSet, HashMap};

use crate::dataset::DatasetKind;
use crate::load::clean::parse_number;

/// A parsed raw dataset: ordered headers plus text rows, addressable by
/// commune code.
///
/// Cells stay as text so that a trip through the cache is lossless; numeric
/// access parses on demand. When a code appears more than once, every row is
/// kept but only the first one is indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct CommuneTable {
    kind: DatasetKind,
    headers: Vec<String>,
    key_column: usize,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl CommuneTable {
    /// Build the table and its code index. `key_column` must be a valid
    /// header index.
    pub fn new(
        kind: DatasetKind,
        headers: Vec<String>,
        key_column: usize,
        rows: Vec<Vec<String>>,
    ) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        for (pos, row) in rows.iter().enumerate() {
            if let Some(code) = row.get(key_column) {
                index.entry(code.clone()).or_insert(pos);
            }
        }
        Self {
            kind,
            headers,
            key_column,
            rows,
            index,
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    pub fn key_header(&self) -> &str {
        &self.headers[self.key_column]
    }

    /// Number of data rows (communes).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Rows that own their code in the index, in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.rows.iter().enumerate().filter_map(move |(pos, row)| {
            let code = row.get(self.key_column)?;
            (self.index.get(code) == Some(&pos)).then(|| (code.as_str(), row.as_slice()))
        })
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn row(&self, code: &str) -> Option<&[String]> {
        self.index.get(code).map(|&pos| self.rows[pos].as_slice())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn value(&self, code: &str, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.row(code)?.get(col).map(String::as_str)
    }

    pub fn number(&self, code: &str, column: &str) -> Option<f64> {
        self.value(code, column).and_then(parse_number)
    }

    /// Distinct commune codes.
    pub fn key_set(&self) -> BTreeSet<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    /// Rows whose code was already seen earlier in the file.
    pub fn duplicate_keys(&self) -> usize {
        self.rows.len() - self.index.len()
    }
}
