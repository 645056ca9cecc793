// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::dataset::DatasetKind;

/// A dataset parsed cleanly but holds a different number of communes than a
/// complete download. Reported as a warning unless strict mode is on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{dataset}: expected {expected} communes, found {actual} (partial or corrupted download?)")]
pub struct RowCountMismatch {
    pub dataset: DatasetKind,
    pub expected: usize,
    pub actual: usize,
}

/// Why a raw dataset could not be turned into a [`crate::CommuneTable`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "{dataset}: raw file not found at {}; download it and place it there",
        path.display()
    )]
    MissingFile { dataset: DatasetKind, path: PathBuf },

    #[error("{dataset}: unexpected column structure in {}: {reason}", path.display())]
    SchemaMismatch {
        dataset: DatasetKind,
        path: PathBuf,
        reason: String,
    },

    #[error(transparent)]
    RowCountMismatch(#[from] RowCountMismatch),

    #[error("{dataset}: failed to read {}", path.display())]
    Io {
        dataset: DatasetKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{dataset}: malformed CSV in {}", path.display())]
    Csv {
        dataset: DatasetKind,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{dataset}: unreadable workbook {}", path.display())]
    Xlsx {
        dataset: DatasetKind,
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
}

impl LoadError {
    pub(crate) fn schema(dataset: DatasetKind, path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LoadError::SchemaMismatch {
            dataset,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Dataset the error belongs to.
    pub fn dataset(&self) -> DatasetKind {
        match self {
            LoadError::MissingFile { dataset, .. }
            | LoadError::SchemaMismatch { dataset, .. }
            | LoadError::Io { dataset, .. }
            | LoadError::Csv { dataset, .. }
            | LoadError::Xlsx { dataset, .. } => *dataset,
            LoadError::RowCountMismatch(m) => m.dataset,
        }
    }

    pub fn is_missing_file(&self) -> bool {
        matches!(self, LoadError::MissingFile { .. })
    }
}
