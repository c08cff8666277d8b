//! Key/value persistence boundary.
//!
//! The pipeline only ever reads and writes whole values under fixed keys,
//! so the store is a two-method trait. [`FileStore`] keeps one JSON file per
//! key; [`MemoryStore`] backs tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pulse_core::error::{PulseError, Result};

/// Opaque string store addressed by key.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, `None` when nothing was ever written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    fn put(&self, key: &str, value: &str) -> Result<()>;
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PulseError::StoreRead {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let write = || -> io::Result<()> {
            std::fs::create_dir_all(&self.dir)?;
            // Temp file + rename so readers never see a half-written value.
            let path = self.path_for(key);
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, value)?;
            std::fs::rename(&tmp, &path)
        };
        write().map_err(|source| PulseError::StoreWrite {
            key: key.to_string(),
            source,
        })
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("store"));

        assert_eq!(store.get("vc_cin7_data").unwrap(), None);
        store.put("vc_cin7_data", "[1,2]").unwrap();
        assert_eq!(store.get("vc_cin7_data").unwrap().as_deref(), Some("[1,2]"));

        store.put("vc_cin7_data", "[]").unwrap();
        assert_eq!(store.get("vc_cin7_data").unwrap().as_deref(), Some("[]"));
        assert!(!tmp.path().join("store").join("vc_cin7_data.json.tmp").exists());
    }

    #[test]
    fn test_file_store_keys_are_independent() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        store.put("a", "1").unwrap();
        store.put("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_file_store_unwritable_dir_is_store_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        // A regular file where the directory should be.
        let store = FileStore::new(&blocker);
        assert!(matches!(
            store.put("k", "v"),
            Err(PulseError::StoreWrite { .. })
        ));
    }

    #[test]
    fn test_file_store_unreadable_value_is_store_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        // A directory where the value file should be.
        std::fs::create_dir(tmp.path().join("k.json")).unwrap();
        assert!(matches!(store.get("k"), Err(PulseError::StoreRead { .. })));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("x").unwrap(), None);
        store.put("x", "y").unwrap();
        assert_eq!(store.get("x").unwrap().as_deref(), Some("y"));
    }
}
