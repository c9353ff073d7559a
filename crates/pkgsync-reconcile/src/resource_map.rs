//! Persisted identity map of package resources (`page title -> id`).

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ReconcileError, Result};

pub type ResourceMap = BTreeMap<String, u64>;

/// Storage of the resource identity map.
///
/// `save` must be atomic: a reader sees either the previous map or the new one.
pub trait ResourceMapStore: Send + Sync {
    /// Loads the map. A map that was never saved is empty.
    fn load(&self) -> Result<ResourceMap>;

    fn save(&self, map: &ResourceMap) -> Result<()>;
}

/// JSON file next to the package assets.
#[derive(Debug, Clone)]
pub struct FileResourceMapStore {
    path: PathBuf,
}

impl FileResourceMapStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceMapStore for FileResourceMapStore {
    fn load(&self) -> Result<ResourceMap> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ResourceMap::new()),
            Err(e) => return Err(ReconcileError::resource_map(&self.path, e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(ResourceMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| ReconcileError::resource_map(&self.path, e.to_string()))
    }

    fn save(&self, map: &ResourceMap) -> Result<()> {
        let err = |message: String| ReconcileError::resource_map(&self.path, message);
        let dir = self
            .path
            .parent()
            .ok_or_else(|| err("path has no parent folder".to_string()))?;
        std::fs::create_dir_all(dir).map_err(|e| err(e.to_string()))?;

        let json = serde_json::to_vec_pretty(map).map_err(|e| err(e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| err(e.to_string()))?;
        tmp.write_all(&json).map_err(|e| err(e.to_string()))?;
        tmp.as_file().sync_all().map_err(|e| err(e.to_string()))?;
        tmp.persist(&self.path).map_err(|e| err(e.error.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileResourceMapStore::new(dir.path().join("resourcemap.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_folders_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets/components/blog/resourcemap.json");
        let store = FileResourceMapStore::new(&path);

        let mut map = ResourceMap::new();
        map.insert("Blog".into(), 4);
        store.save(&map).unwrap();

        map.insert("Archive".into(), 9);
        map.remove("Blog");
        store.save(&map).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["Archive"], 9);

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resourcemap.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileResourceMapStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ReconcileError::ResourceMap { .. }));
    }
}
