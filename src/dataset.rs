//! The three INSEE raw datasets and everything fixed about them: file names,
//! formats, expected commune counts and how to find the key column.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// One of the raw datasets the operator downloads by hand.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Employment and active population, 2020 (`base-cc-emploi-pop-active`).
    Employment,
    /// Housing, 2021 (`base-cc-logement`).
    Housing,
    /// Median income / standard of living per commune, 2013.
    Income,
}

/// On-disk format of a raw file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text, `;` or `,`.
    Csv,
    /// Excel workbook; only the first worksheet is read.
    Xlsx,
}

/// Rule for locating the commune-code column in a header row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyColumn {
    /// Exact header name.
    Named(&'static str),
    /// First header containing any fragment (case-insensitive), else column 0.
    Detect(&'static [&'static str]),
}

impl KeyColumn {
    /// Index of the key column in `headers`, if it can be found.
    pub fn resolve(&self, headers: &[String]) -> Option<usize> {
        match self {
            KeyColumn::Named(name) => headers.iter().position(|h| h == name),
            KeyColumn::Detect(fragments) => {
                if headers.is_empty() {
                    return None;
                }
                let found = headers.iter().position(|h| {
                    let upper = h.to_uppercase();
                    fragments.iter().any(|f| upper.contains(f))
                });
                Some(found.unwrap_or(0))
            }
        }
    }
}

impl fmt::Display for KeyColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyColumn::Named(name) => write!(f, "`{}`", name),
            KeyColumn::Detect(fragments) => write!(f, "a header containing {}", fragments.join(" or ")),
        }
    }
}

impl DatasetKind {
    /// Load order used by verification.
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Employment,
        DatasetKind::Housing,
        DatasetKind::Income,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Employment => "employment",
            DatasetKind::Housing => "housing",
            DatasetKind::Income => "income",
        }
    }

    /// Raw file name inside the raw directory (case-sensitive).
    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetKind::Employment => "base-cc-emploi-pop-active-2020_v2.CSV",
            DatasetKind::Housing => "base-cc-logement-2021.CSV",
            DatasetKind::Income => "Niveau_de_vie_2013_a_la_commune-Global_Map_Solution (1).xlsx",
        }
    }

    /// Variable dictionary shipped with the repository, when INSEE publishes one.
    pub fn metadata_file_name(&self) -> Option<&'static str> {
        match self {
            DatasetKind::Employment => Some("meta_base-cc-emploi-pop-active-2020_v2.CSV"),
            DatasetKind::Housing => Some("meta_base-cc-logement-2021.CSV"),
            DatasetKind::Income => None,
        }
    }

    /// Number of communes a complete download contains.
    pub fn expected_rows(&self) -> usize {
        match self {
            DatasetKind::Employment => 34_963,
            DatasetKind::Housing => 34_963,
            DatasetKind::Income => 36_572,
        }
    }

    pub fn format(&self) -> FileFormat {
        match self {
            DatasetKind::Employment | DatasetKind::Housing => FileFormat::Csv,
            DatasetKind::Income => FileFormat::Xlsx,
        }
    }

    pub fn key_column(&self) -> KeyColumn {
        match self {
            DatasetKind::Employment | DatasetKind::Housing => KeyColumn::Named("CODGEO"),
            DatasetKind::Income => KeyColumn::Detect(&["CODE", "COM"]),
        }
    }

    pub fn raw_path(&self, raw_dir: &Path) -> PathBuf {
        raw_dir.join(self.file_name())
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn documented_layout() {
        let raw = Path::new("data/raw");
        assert_eq!(
            DatasetKind::Income.raw_path(raw),
            PathBuf::from("data/raw/Niveau_de_vie_2013_a_la_commune-Global_Map_Solution (1).xlsx")
        );
        assert_eq!(DatasetKind::Employment.expected_rows(), 34_963);
        assert_eq!(DatasetKind::Housing.expected_rows(), 34_963);
        assert_eq!(DatasetKind::Income.expected_rows(), 36_572);
        assert_eq!(DatasetKind::Income.metadata_file_name(), None);
    }

    #[test]
    fn named_key_column_is_exact() {
        let key = KeyColumn::Named("CODGEO");
        assert_eq!(key.resolve(&headers(&["LIBGEO", "CODGEO"])), Some(1));
        assert_eq!(key.resolve(&headers(&["codgeo"])), None);
    }

    #[test]
    fn detected_key_column_falls_back_to_first() {
        let key = DatasetKind::Income.key_column();
        assert_eq!(
            key.resolve(&headers(&["Nom", "Code commune", "Niveau de vie"])),
            Some(1)
        );
        assert_eq!(key.resolve(&headers(&["insee", "Niveau de vie"])), Some(0));
        assert_eq!(key.resolve(&[]), None);
    }
}
