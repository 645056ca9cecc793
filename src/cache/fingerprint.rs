use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

/// Identity of a raw file at a point in time: canonical path, size and
/// modification time. Any change to one of these invalidates a cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Nanoseconds since the Unix epoch; 0 when the platform has no mtime.
    pub modified_ns: u64,
}

impl Fingerprint {
    pub fn of(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        Self::from_metadata(path, &metadata)
    }

    pub fn from_metadata(path: &Path, metadata: &fs::Metadata) -> io::Result<Self> {
        let modified_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(Self {
            path: fs::canonicalize(path)?,
            size_bytes: metadata.len(),
            modified_ns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn same_file_same_fingerprint() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("raw.CSV");
        fs::write(&path, "CODGEO;X\n01001;1\n")?;

        let a = Fingerprint::of(&path)?;
        let b = Fingerprint::of(dir.path().join(".").join("raw.CSV"))?;
        assert_eq!(a, b);
        assert_eq!(a.size_bytes, 17);
        Ok(())
    }

    #[test]
    fn content_change_changes_fingerprint() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("raw.CSV");
        fs::write(&path, "CODGEO;X\n01001;1\n")?;
        let before = Fingerprint::of(&path)?;

        fs::write(&path, "CODGEO;X\n01001;1\n01002;2\n")?;
        assert_ne!(before, Fingerprint::of(&path)?);
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Fingerprint::of(dir.path().join("absent.CSV")).is_err());
    }
}
