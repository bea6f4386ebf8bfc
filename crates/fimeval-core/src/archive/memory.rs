use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::ArtifactStore;
use crate::error::{FimError, Result};

/// In-memory archive keyed by relative path.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn versions(&self) -> Result<Vec<String>> {
        let files = self.files();
        let mut versions: Vec<String> = files
            .keys()
            .filter(|path| path.components().count() > 1)
            .filter_map(|path| match path.components().next() {
                Some(Component::Normal(name)) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    fn exists(&self, relative: &Path) -> Result<bool> {
        Ok(self.files().contains_key(relative))
    }

    fn read(&self, relative: &Path) -> Result<Vec<u8>> {
        self.files()
            .get(relative)
            .cloned()
            .ok_or_else(|| FimError::missing(relative.display().to_string(), "archived artifact"))
    }

    fn write(&self, relative: &Path, data: &[u8]) -> Result<()> {
        self.files().insert(relative.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn resolve(&self, relative: &Path) -> PathBuf {
        relative.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_top_level_dirs() {
        let store = MemoryArtifactStore::new();
        store.write(Path::new("v2/100yr/stats.csv"), b"").unwrap();
        store.write(Path::new("v1/100yr/stats.csv"), b"").unwrap();
        store.write(Path::new("v1/500yr/stats.csv"), b"").unwrap();
        store.write(Path::new("loose.txt"), b"").unwrap();
        assert_eq!(store.versions().unwrap(), vec!["v1", "v2"]);
    }

    #[test]
    fn missing_read() {
        let store = MemoryArtifactStore::new();
        assert!(store.read(Path::new("v1/x")).is_err());
    }
}
