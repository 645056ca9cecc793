//! INSEE variable dictionaries (`meta_*.CSV`) shipped next to the raw files.

use anyhow::{bail, Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use crate::load::clean::{clean_str, sniff_delimiter};

/// Column code → human label, e.g. `P21_LOG` → `Logements en 2021 (princ)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatasetMetadata {
    labels: BTreeMap<String, String>,
}

impl DatasetMetadata {
    /// Parse a dictionary with `COD_VAR` and `LIB_VAR` columns.
    ///
    /// INSEE repeats a variable once per modality; the first label wins.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
        let delimiter = sniff_delimiter(&String::from_utf8_lossy(first_line));
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = rdr
            .byte_headers()?
            .iter()
            .map(|h| clean_str(&String::from_utf8_lossy(h)).to_ascii_uppercase())
            .collect();
        let (code_col, label_col) = match (
            headers.iter().position(|h| h == "COD_VAR"),
            headers.iter().position(|h| h == "LIB_VAR"),
        ) {
            (Some(c), Some(l)) => (c, l),
            _ => bail!("expected COD_VAR and LIB_VAR columns, found {:?}", headers),
        };

        let mut labels = BTreeMap::new();
        let mut record = ByteRecord::new();
        while rdr.read_byte_record(&mut record)? {
            let (Some(code), Some(label)) = (record.get(code_col), record.get(label_col)) else {
                continue;
            };
            let code = clean_str(&String::from_utf8_lossy(code));
            if code.is_empty() {
                continue;
            }
            labels
                .entry(code)
                .or_insert_with(|| clean_str(&String::from_utf8_lossy(label)));
        }
        Ok(Self { labels })
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
