use std::collections::HashMap;
use std::sync::RwLock;

use crate::{SidecarError, SidecarStore};

/// In-memory sidecar store. Nothing survives the process; meant for tests
/// and for callers that opt out of persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SidecarStore for MemoryStore {
    fn get(&self, path: &str, key: &str) -> Result<Option<String>, SidecarError> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(path).and_then(|attrs| attrs.get(key)).cloned())
    }

    fn set(&self, path: &str, key: &str, value: &str) -> Result<(), SidecarError> {
        let mut entries = self.entries.write().unwrap();
        entries
            .entry(path.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, path: &str, key: &str) -> Result<(), SidecarError> {
        let mut entries = self.entries.write().unwrap();
        if let Some(attrs) = entries.get_mut(path) {
            attrs.remove(key);
        }
        Ok(())
    }
}
