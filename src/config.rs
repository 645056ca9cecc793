//! Loader configuration

use std::path::{Path, PathBuf};

use crate::dataset::DatasetKind;

/// Default data root, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Where the raw files live, where the cache goes, and how strictly
/// row-count mismatches are treated.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Config {
    /// Directory the operator fills with downloaded raw files
    pub raw_dir: PathBuf,

    /// Directory for derived Parquet copies, created on first store
    pub cache_dir: PathBuf,

    /// Truth that parsed tables are read from and written to the cache
    pub use_cache: bool,

    /// Truth that a row-count mismatch fails the load instead of warning
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_data_dir(DEFAULT_DATA_DIR)
    }
}

impl Config {
    /// `<data_dir>/raw` and `<data_dir>/cache`, cache on, lenient.
    pub fn from_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            raw_dir: data_dir.join("raw"),
            cache_dir: data_dir.join("cache"),
            use_cache: true,
            strict: false,
        }
    }

    pub fn with_cache(self, use_cache: bool) -> Self {
        Self { use_cache, ..self }
    }

    pub fn with_strict(self, strict: bool) -> Self {
        Self { strict, ..self }
    }

    pub fn raw_path(&self, kind: DatasetKind) -> PathBuf {
        kind.raw_path(&self.raw_dir)
    }

    pub fn metadata_path(&self, kind: DatasetKind) -> Option<PathBuf> {
        kind.metadata_file_name().map(|name| self.raw_dir.join(name))
    }
}
