use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::ArtifactStore;
use crate::error::{FimError, Result};

/// Filesystem-backed archive rooted at a directory.
///
/// The root is not created up front; a missing root reads as an empty
/// archive.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn versions(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        versions.sort();
        Ok(versions)
    }

    fn exists(&self, relative: &Path) -> Result<bool> {
        Ok(self.root.join(relative).is_file())
    }

    fn read(&self, relative: &Path) -> Result<Vec<u8>> {
        let path = self.root.join(relative);
        fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                FimError::missing(path.display().to_string(), "archived artifact")
            } else {
                FimError::Io(e)
            }
        })
    }

    fn write(&self, relative: &Path, data: &[u8]) -> Result<()> {
        write_atomic(&self.root.join(relative), data)
    }

    fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Write `data` to `path` through a temp file in the same directory.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let rel = Path::new("v1/100yr/stats.csv");
        store.write(rel, b"statistic,value\n").unwrap();
        assert!(store.exists(rel).unwrap());
        assert_eq!(store.read(rel).unwrap(), b"statistic,value\n");
        assert_eq!(store.versions().unwrap(), vec!["v1"]);
    }

    #[test]
    fn read_missing_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(matches!(
            store.read(Path::new("v1/100yr/stats.json")),
            Err(FimError::MissingArtifact { .. })
        ));
    }

    #[test]
    fn versions_skip_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("README"), b"").unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert_eq!(store.versions().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x/stats.json");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
