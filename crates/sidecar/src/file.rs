use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::{SidecarError, SidecarStore};

/// Sidecar store backed by one JSON document on disk.
///
/// The whole document is loaded at open and rewritten on every mutation.
/// Fine for the handful of markers an upload client keeps; callers needing
/// more should bring their own store.
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl JsonFileStore {
    /// Opens the store, loading existing markers from disk.
    pub fn open(path: PathBuf) -> Result<Self, SidecarError> {
        let entries = load_entries(&path)?;
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Writes the current markers to disk.
    fn persist(&self) -> Result<(), SidecarError> {
        let entries = self.entries.read().unwrap();
        let json = serde_json::to_string_pretty(&*entries)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!("persisted markers for {} file(s) to {:?}", entries.len(), self.path);
        Ok(())
    }
}

impl SidecarStore for JsonFileStore {
    fn get(&self, path: &str, key: &str) -> Result<Option<String>, SidecarError> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(path).and_then(|attrs| attrs.get(key)).cloned())
    }

    fn set(&self, path: &str, key: &str, value: &str) -> Result<(), SidecarError> {
        {
            let mut entries = self.entries.write().unwrap();
            entries
                .entry(path.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        self.persist()
    }

    fn remove(&self, path: &str, key: &str) -> Result<(), SidecarError> {
        {
            let mut entries = self.entries.write().unwrap();
            if let Some(attrs) = entries.get_mut(path) {
                attrs.remove(key);
            }
        }
        self.persist()
    }
}

/// Loads markers from a JSON file on disk.
fn load_entries(path: &Path) -> Result<HashMap<String, HashMap<String, String>>, SidecarError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    let entries: HashMap<String, HashMap<String, String>> = serde_json::from_str(&data)?;
    debug!("loaded markers for {} file(s) from {:?}", entries.len(), path);
    Ok(entries)
}
