//! Parquet disk cache of parsed commune tables
//!
//! Raw INSEE files are large and slow to parse (the workbook especially), so
//! each successful parse is written under the cache directory as:
//!
//! - `<dataset>.parquet`: every column as non-null Utf8, one row per commune
//! - `<dataset>.manifest.json`: the raw file's fingerprint, row count and key
//!   column
//!
//! An entry is only used when its manifest matches the current raw file.
//! Both files are written to a tmp path and renamed, manifest last.

mod columns;
mod fingerprint;
mod manifest;

pub use fingerprint::Fingerprint;
pub use manifest::{CacheManifest, CACHE_FORMAT_VERSION};

use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
    format::KeyValue,
};
use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::{dataset::DatasetKind, table::CommuneTable};

/// Parquet key-value metadata entries, visible to `inspect_cache`.
pub const META_DATASET: &str = "communes.dataset";
pub const META_KEY_COLUMN: &str = "communes.key_column";

/// Cache directory handle. The directory is created on first store.
#[derive(Clone, Debug)]
pub struct TableCache {
    dir: PathBuf,
}

impl TableCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_path(&self, kind: DatasetKind) -> PathBuf {
        self.dir.join(format!("{}.parquet", kind.as_str()))
    }

    pub fn manifest_path(&self, kind: DatasetKind) -> PathBuf {
        self.dir.join(format!("{}.manifest.json", kind.as_str()))
    }

    /// Cached table for `kind` if an entry derived from `source` exists.
    ///
    /// `Ok(None)` means no entry or a stale one; `Err` means an entry exists
    /// but cannot be read back, and the caller should re-parse.
    pub fn lookup(&self, kind: DatasetKind, source: &Fingerprint) -> Result<Option<CommuneTable>> {
        let manifest_path = self.manifest_path(kind);
        if !manifest_path.exists() {
            debug!(dataset = %kind, "no cache entry");
            return Ok(None);
        }

        let manifest = CacheManifest::read(&manifest_path)?;
        if !manifest.matches(kind, source) {
            info!(dataset = %kind, cached_at = %manifest.created_at, "cache entry is stale");
            return Ok(None);
        }

        let table = self.read_table(kind, &manifest)?;
        debug!(dataset = %kind, rows = table.len(), "cache hit");
        Ok(Some(table))
    }

    fn read_table(&self, kind: DatasetKind, manifest: &CacheManifest) -> Result<CommuneTable> {
        let data_path = self.data_path(kind);
        let file = File::open(&data_path)
            .with_context(|| format!("opening cache file {}", data_path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading parquet footer of {}", data_path.display()))?;
        let headers: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        let reader = builder.build().context("building parquet reader")?;

        let mut rows = Vec::with_capacity(manifest.rows);
        for batch in reader {
            let batch = batch.with_context(|| format!("decoding {}", data_path.display()))?;
            columns::append_batch_rows(&batch, &mut rows)?;
        }
        if rows.len() != manifest.rows {
            bail!(
                "cache file {} holds {} rows, manifest says {}",
                data_path.display(),
                rows.len(),
                manifest.rows
            );
        }

        let key_column = headers
            .iter()
            .position(|h| *h == manifest.key_column)
            .with_context(|| {
                format!(
                    "key column {} missing from cached schema",
                    manifest.key_column
                )
            })?;
        Ok(CommuneTable::new(kind, headers, key_column, rows))
    }

    /// Write `table` as the entry for its dataset, replacing any previous one.
    pub fn store(&self, table: &CommuneTable, source: &Fingerprint) -> Result<()> {
        let kind = table.kind();
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache directory {}", self.dir.display()))?;

        // 1) Hide the old entry before touching its data
        let manifest_path = self.manifest_path(kind);
        remove_if_exists(&manifest_path)?;

        // 2) Parquet to a tmp path, then rename into place
        let data_path = self.data_path(kind);
        let tmp_path = data_path.with_extension("parquet.tmp");
        let batch = columns::table_to_batch(table)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_key_value_metadata(Some(vec![
                KeyValue::new(META_DATASET.to_string(), kind.as_str().to_string()),
                KeyValue::new(META_KEY_COLUMN.to_string(), table.key_header().to_string()),
            ]))
            .build();
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
            .context("creating ArrowWriter for cache entry")?;
        writer.write(&batch).context("writing cache batch")?;
        writer.close().context("closing cache writer")?;
        fs::rename(&tmp_path, &data_path).with_context(|| {
            format!(
                "renaming {} -> {}",
                tmp_path.display(),
                data_path.display()
            )
        })?;

        // 3) Manifest last: from here on the entry is visible
        CacheManifest::new(kind, source.clone(), table.len(), table.key_header())
            .write(&manifest_path)?;

        info!(
            dataset = %kind,
            rows = table.len(),
            path = %data_path.display(),
            "cached"
        );
        Ok(())
    }

    /// Drop the entry for `kind`. Returns whether anything was removed.
    pub fn invalidate(&self, kind: DatasetKind) -> Result<bool> {
        let manifest = remove_if_exists(&self.manifest_path(kind))?;
        let data = remove_if_exists(&self.data_path(kind))?;
        Ok(manifest || data)
    }

    /// Remove every cache file, including leftovers of interrupted writes.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }
        let base = Pattern::escape(&self.dir.to_string_lossy());
        let mut removed = 0;
        for suffix in ["*.parquet", "*.manifest.json", "*.tmp"] {
            let pattern = format!("{}/{}", base, suffix);
            for entry in glob(&pattern).context("invalid cache glob pattern")? {
                let path = entry?;
                if remove_if_exists(&path)? {
                    removed += 1;
                }
            }
        }
        info!(removed, dir = %self.dir.display(), "cache cleared");
        Ok(removed)
    }

    /// Manifests of every readable entry, in dataset order.
    pub fn entries(&self) -> Result<Vec<CacheManifest>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = format!("{}/*.manifest.json", Pattern::escape(&self.dir.to_string_lossy()));
        let mut manifests = Vec::new();
        for entry in glob(&pattern).context("invalid cache glob pattern")? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("cannot read glob entry: {}", e);
                    continue;
                }
            };
            match CacheManifest::read(&path) {
                Ok(m) => manifests.push(m),
                Err(e) => warn!("Skipping corrupt {}: {:#}", path.display(), e),
            }
        }
        manifests.sort_by_key(|m| m.dataset);
        Ok(manifests)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table() -> CommuneTable {
        CommuneTable::new(
            DatasetKind::Housing,
            vec!["CODGEO".into(), "LIBGEO".into(), "P21_LOG".into()],
            0,
            vec![
                vec!["01001".into(), "L'Abergement-Clémenciat".into(), "400".into()],
                vec!["2A004".into(), "Ajaccio".into(), "".into()],
            ],
        )
    }

    fn source(dir: &Path) -> Result<Fingerprint> {
        let raw = dir.join("base-cc-logement-2021.CSV");
        fs::write(&raw, "stand-in raw file")?;
        Ok(Fingerprint::of(&raw)?)
    }

    #[test]
    fn store_then_lookup_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let cache = TableCache::new(dir.path().join("cache"));
        let fp = source(dir.path())?;

        assert!(cache.lookup(DatasetKind::Housing, &fp)?.is_none());
        cache.store(&table(), &fp)?;
        assert!(cache.dir().is_dir());

        let cached = cache.lookup(DatasetKind::Housing, &fp)?.expect("cache hit");
        assert_eq!(cached, table());
        Ok(())
    }

    #[test]
    fn other_fingerprint_is_stale() -> Result<()> {
        let dir = tempdir()?;
        let cache = TableCache::new(dir.path().join("cache"));
        let fp = source(dir.path())?;
        cache.store(&table(), &fp)?;

        let touched = Fingerprint {
            size_bytes: fp.size_bytes + 1,
            ..fp
        };
        assert!(cache.lookup(DatasetKind::Housing, &touched)?.is_none());
        Ok(())
    }

    #[test]
    fn corrupt_data_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let cache = TableCache::new(dir.path().join("cache"));
        let fp = source(dir.path())?;
        cache.store(&table(), &fp)?;

        fs::write(cache.data_path(DatasetKind::Housing), b"PAR1 garbage")?;
        assert!(cache.lookup(DatasetKind::Housing, &fp).is_err());

        fs::remove_file(cache.data_path(DatasetKind::Housing))?;
        assert!(cache.lookup(DatasetKind::Housing, &fp).is_err());
        Ok(())
    }

    #[test]
    fn entries_invalidate_and_clear() -> Result<()> {
        let dir = tempdir()?;
        let cache = TableCache::new(dir.path().join("cache"));
        assert!(cache.entries()?.is_empty());
        assert_eq!(cache.clear()?, 0);

        let fp = source(dir.path())?;
        cache.store(&table(), &fp)?;
        fs::write(cache.dir().join("income.manifest.json"), "{")?;
        fs::write(cache.dir().join("employment.parquet.tmp"), "partial")?;

        let entries = cache.entries()?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dataset, DatasetKind::Housing);
        assert_eq!(entries[0].rows, 2);

        assert!(cache.invalidate(DatasetKind::Housing)?);
        assert!(!cache.invalidate(DatasetKind::Housing)?);

        assert_eq!(cache.clear()?, 2);
        assert!(fs::read_dir(cache.dir())?.next().is_none());
        Ok(())
    }
}
