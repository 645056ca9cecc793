// src/load/mod.rs

pub mod clean;
mod delimited;
mod workbook;

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{Fingerprint, TableCache},
    config::Config,
    dataset::{DatasetKind, FileFormat},
    error::{LoadError, RowCountMismatch},
    table::CommuneTable,
};
use clean::{is_insee_code, normalize_commune_code};

/// Headers and cleaned text rows straight out of a raw file, before the key
/// column is resolved.
#[derive(Debug)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Where a loaded table came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Raw,
    Cache,
}

impl LoadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadSource::Raw => "raw",
            LoadSource::Cache => "cache",
        }
    }
}

/// Outcome of one successful load.
#[derive(Clone, Debug)]
pub struct LoadReport {
    pub dataset: DatasetKind,
    pub path: PathBuf,
    pub rows: usize,
    pub expected: usize,
    pub source: LoadSource,
    pub elapsed: Duration,
    /// Set when the count differs from a complete download (lenient mode only).
    pub mismatch: Option<RowCountMismatch>,
}

impl LoadReport {
    /// Truth that the row count matches the documented total.
    pub fn is_complete(&self) -> bool {
        self.mismatch.is_none()
    }
}

/// A table together with how it was obtained.
#[derive(Clone, Debug)]
pub struct Loaded {
    pub table: CommuneTable,
    pub report: LoadReport,
}

pub(crate) fn io_error(kind: DatasetKind, path: &Path) -> impl Fn(io::Error) -> LoadError + '_ {
    move |source| LoadError::Io {
        dataset: kind,
        path: path.to_path_buf(),
        source,
    }
}

/// Parse a raw file without touching the cache.
///
/// The file's extension must match the dataset's documented format. Commune
/// codes in the key column are normalized (zero-padded, upper-cased).
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn parse_raw(kind: DatasetKind, path: impl AsRef<Path>) -> Result<CommuneTable, LoadError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let raw = match (kind.format(), extension.as_str()) {
        (FileFormat::Csv, "csv") => delimited::read_csv(kind, path)?,
        (FileFormat::Xlsx, "xlsx" | "xlsm") => workbook::read_xlsx(kind, path)?,
        (format, _) => {
            return Err(LoadError::schema(
                kind,
                path,
                format!("extension `.{}` does not match the {:?} format", extension, format),
            ))
        }
    };
    into_table(kind, path, raw)
}

/// Resolve the key column and normalize the codes it holds.
fn into_table(kind: DatasetKind, path: &Path, raw: RawTable) -> Result<CommuneTable, LoadError> {
    let key_rule = kind.key_column();
    let key = key_rule.resolve(&raw.headers).ok_or_else(|| {
        LoadError::schema(
            kind,
            path,
            format!(
                "key column {} not found among {} headers",
                key_rule,
                raw.headers.len()
            ),
        )
    })?;

    let mut rows = raw.rows;
    let mut unusual = 0usize;
    for row in &mut rows {
        let code = normalize_commune_code(&row[key]);
        if !is_insee_code(&code) {
            unusual += 1;
        }
        row[key] = code;
    }
    if unusual > 0 {
        debug!(dataset = %kind, unusual, "codes outside the INSEE commune pattern");
    }

    let table = CommuneTable::new(kind, raw.headers, key, rows);
    if table.duplicate_keys() > 0 {
        warn!(
            dataset = %kind,
            duplicates = table.duplicate_keys(),
            "duplicate commune codes; first occurrence is indexed"
        );
    }
    Ok(table)
}

/// Loads the raw datasets, going through the Parquet cache when enabled.
pub struct Loader {
    config: Config,
    cache: Option<TableCache>,
}

impl Loader {
    pub fn new(config: Config) -> Self {
        let cache = config
            .use_cache
            .then(|| TableCache::new(config.cache_dir.clone()));
        Self { config, cache }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> Option<&TableCache> {
        self.cache.as_ref()
    }

    /// Load one dataset.
    ///
    /// The raw file must exist even when a cache entry is present. A cache
    /// entry that is stale, unreadable or corrupt is ignored and the raw file
    /// is parsed again; failing to write the cache only logs a warning.
    #[instrument(level = "info", skip(self), fields(dataset = %kind))]
    pub fn load(&self, kind: DatasetKind) -> Result<Loaded, LoadError> {
        let start = Instant::now();
        let path = self.config.raw_path(kind);

        // 1) The raw file is the source of truth
        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(LoadError::MissingFile { dataset: kind, path }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::MissingFile { dataset: kind, path })
            }
            Err(e) => return Err(io_error(kind, &path)(e)),
        };

        // 2) Fingerprint + cache lookup
        let fingerprint = match &self.cache {
            Some(_) => match Fingerprint::from_metadata(&path, &metadata) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    warn!("cannot fingerprint {}, cache bypassed: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };
        let cached = match (&self.cache, &fingerprint) {
            (Some(cache), Some(fp)) => match cache.lookup(kind, fp) {
                Ok(hit) => hit,
                Err(e) => {
                    warn!("cache entry unreadable, re-parsing raw file: {:#}", e);
                    None
                }
            },
            _ => None,
        };

        // 3) Parse on miss, then refresh the cache
        let (table, source) = match cached {
            Some(table) => (table, LoadSource::Cache),
            None => {
                let table = parse_raw(kind, &path)?;
                if let (Some(cache), Some(fp)) = (&self.cache, &fingerprint) {
                    if let Err(e) = cache.store(&table, fp) {
                        warn!("failed to write cache entry: {:#}", e);
                    }
                }
                (table, LoadSource::Raw)
            }
        };

        // 4) Compare against the documented commune count
        let expected = kind.expected_rows();
        let mismatch = (table.len() != expected).then(|| RowCountMismatch {
            dataset: kind,
            expected,
            actual: table.len(),
        });
        if let Some(m) = &mismatch {
            if self.config.strict {
                return Err(m.clone().into());
            }
            warn!(expected, actual = table.len(), "row count mismatch");
        }

        let report = LoadReport {
            dataset: kind,
            path,
            rows: table.len(),
            expected,
            source,
            elapsed: start.elapsed(),
            mismatch,
        };
        info!(
            rows = report.rows,
            source = report.source.as_str(),
            elapsed = ?report.elapsed,
            "loaded"
        );
        Ok(Loaded { table, report })
    }

    /// Load every dataset in documented order, one after another.
    pub fn load_all(&self) -> Vec<Result<Loaded, LoadError>> {
        DatasetKind::ALL.iter().map(|&kind| self.load(kind)).collect()
    }
}
