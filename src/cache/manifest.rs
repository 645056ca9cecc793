use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use super::Fingerprint;
use crate::dataset::DatasetKind;

/// Bump whenever the Parquet layout or the parsing rules change, so entries
/// written by an older build are re-derived.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Sidecar describing one cache entry. Written after the Parquet file, so a
/// manifest on disk means the data it points to is complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub format_version: u32,
    pub dataset: DatasetKind,
    pub source: Fingerprint,
    pub rows: usize,
    pub key_column: String,
    pub created_at: DateTime<Utc>,
}

impl CacheManifest {
    pub fn new(dataset: DatasetKind, source: Fingerprint, rows: usize, key_column: &str) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            dataset,
            source,
            rows,
            key_column: key_column.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Truth that this entry was derived from exactly `source` by this build.
    pub fn matches(&self, dataset: DatasetKind, source: &Fingerprint) -> bool {
        self.format_version == CACHE_FORMAT_VERSION
            && self.dataset == dataset
            && &self.source == source
    }

    pub fn read(path: &Path) -> Result<Self> {
        let f = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(f).with_context(|| format!("parsing {}", path.display()))
    }

    /// Write atomically: to a dot-prefixed tmp file, then rename over the target.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("manifest path has no file name")?;
        let tmp_path: PathBuf = path.with_file_name(format!(".{}.tmp", file_name));

        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        // pretty-print with a trailing newline
        serde_json::to_writer_pretty(&mut tmp, self).context("serializing cache manifest")?;
        tmp.write_all(b"\n")?;
        tmp.sync_all()?;

        fs::rename(&tmp_path, path).with_context(|| {
            format!("renaming {} -> {}", tmp_path.display(), path.display())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fingerprint() -> Fingerprint {
        Fingerprint {
            path: PathBuf::from("/data/raw/base-cc-logement-2021.CSV"),
            size_bytes: 42,
            modified_ns: 1_700_000_000_000_000_000,
        }
    }

    #[test]
    fn write_then_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("housing.manifest.json");
        let manifest = CacheManifest::new(DatasetKind::Housing, fingerprint(), 3, "CODGEO");

        manifest.write(&path)?;
        assert_eq!(CacheManifest::read(&path)?, manifest);
        assert!(!dir.path().join(".housing.manifest.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn matches_checks_version_dataset_and_source() {
        let manifest = CacheManifest::new(DatasetKind::Housing, fingerprint(), 3, "CODGEO");
        assert!(manifest.matches(DatasetKind::Housing, &fingerprint()));
        assert!(!manifest.matches(DatasetKind::Employment, &fingerprint()));

        let touched = Fingerprint {
            modified_ns: 1,
            ..fingerprint()
        };
        assert!(!manifest.matches(DatasetKind::Housing, &touched));

        let old = CacheManifest {
            format_version: 0,
            ..manifest
        };
        assert!(!old.matches(DatasetKind::Housing, &fingerprint()));
    }

    #[test]
    fn garbage_fails_to_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("income.manifest.json");
        fs::write(&path, "{ not json")?;
        assert!(CacheManifest::read(&path).is_err());
        Ok(())
    }
}
