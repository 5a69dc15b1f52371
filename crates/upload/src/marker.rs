use skiff_sidecar::{
    MARKER_CANONICAL_PATH, MARKER_LAST_VERSION, MARKER_OBJECT_ID, SidecarError, SidecarStore,
};
use tracing::debug;

/// Reads and writes the sidecar markers that make re-uploads recognizable.
///
/// The object-id and canonical-path markers always move together: an id
/// without a matching path marker means the file was copied, and the copy
/// must not inherit the original's identity.
pub struct MarkerWriter<'a> {
    store: &'a dyn SidecarStore,
}

impl<'a> MarkerWriter<'a> {
    pub fn new(store: &'a dyn SidecarStore) -> Self {
        Self { store }
    }

    /// Writes the object id and canonical path markers as a pair.
    ///
    /// If the second write fails, the first is rolled back to its previous
    /// value so the pair never goes inconsistent.
    pub fn write_identity(&self, path: &str, object_id: &str) -> Result<(), SidecarError> {
        let previous = self.store.get(path, MARKER_OBJECT_ID)?;
        self.store.set(path, MARKER_OBJECT_ID, object_id)?;

        if let Err(e) = self.store.set(path, MARKER_CANONICAL_PATH, path) {
            match previous {
                Some(prev) => {
                    let _ = self.store.set(path, MARKER_OBJECT_ID, &prev);
                }
                None => {
                    let _ = self.store.remove(path, MARKER_OBJECT_ID);
                }
            }
            return Err(e);
        }

        debug!(path, object_id, "identity markers written");
        Ok(())
    }

    /// Records the version string the server accepted.
    pub fn write_version(&self, path: &str, version: &str) -> Result<(), SidecarError> {
        self.store.set(path, MARKER_LAST_VERSION, version)
    }

    /// Returns the recorded object id, provided the canonical-path marker
    /// still names this path. A mismatch (file copied or moved) yields `None`
    /// so the session requests a fresh id.
    pub fn recall_object_id(&self, path: &str) -> Result<Option<String>, SidecarError> {
        let Some(id) = self.store.get(path, MARKER_OBJECT_ID)? else {
            return Ok(None);
        };
        match self.store.get(path, MARKER_CANONICAL_PATH)? {
            Some(canonical) if canonical == path => Ok(Some(id)),
            _ => Ok(None),
        }
    }

    /// Returns the last version the server accepted for this path.
    pub fn recall_version(&self, path: &str) -> Result<Option<String>, SidecarError> {
        self.store.get(path, MARKER_LAST_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_sidecar::MemoryStore;

    #[test]
    fn identity_round_trip() {
        let store = MemoryStore::new();
        let markers = MarkerWriter::new(&store);

        markers.write_identity("/data/a.bin", "g-1").unwrap();
        assert_eq!(
            markers.recall_object_id("/data/a.bin").unwrap().as_deref(),
            Some("g-1")
        );
    }

    #[test]
    fn unknown_path_recalls_nothing() {
        let store = MemoryStore::new();
        let markers = MarkerWriter::new(&store);
        assert!(markers.recall_object_id("/data/a.bin").unwrap().is_none());
    }

    #[test]
    fn copied_file_does_not_inherit_identity() {
        let store = MemoryStore::new();
        let markers = MarkerWriter::new(&store);
        markers.write_identity("/data/a.bin", "g-1").unwrap();

        // Simulate a copy: the id marker travelled, the path marker names the
        // original location.
        store
            .set("/data/copy.bin", MARKER_OBJECT_ID, "g-1")
            .unwrap();
        store
            .set("/data/copy.bin", MARKER_CANONICAL_PATH, "/data/a.bin")
            .unwrap();

        assert!(markers.recall_object_id("/data/copy.bin").unwrap().is_none());
    }

    #[test]
    fn version_round_trip() {
        let store = MemoryStore::new();
        let markers = MarkerWriter::new(&store);
        markers.write_version("/data/a.bin", "v-7").unwrap();
        assert_eq!(
            markers.recall_version("/data/a.bin").unwrap().as_deref(),
            Some("v-7")
        );
    }

    /// Store that fails every write of the canonical-path marker.
    struct PathWriteFails(MemoryStore);

    impl SidecarStore for PathWriteFails {
        fn get(&self, path: &str, key: &str) -> Result<Option<String>, SidecarError> {
            self.0.get(path, key)
        }

        fn set(&self, path: &str, key: &str, value: &str) -> Result<(), SidecarError> {
            if key == MARKER_CANONICAL_PATH {
                return Err(SidecarError::Io(std::io::Error::other("write refused")));
            }
            self.0.set(path, key, value)
        }

        fn remove(&self, path: &str, key: &str) -> Result<(), SidecarError> {
            self.0.remove(path, key)
        }
    }

    #[test]
    fn partial_identity_write_rolls_back() {
        let store = PathWriteFails(MemoryStore::new());
        let markers = MarkerWriter::new(&store);

        assert!(markers.write_identity("/data/a.bin", "g-1").is_err());
        // The id marker must not survive the failed pair write.
        assert!(store.get("/data/a.bin", MARKER_OBJECT_ID).unwrap().is_none());
    }

    #[test]
    fn failed_rewrite_restores_previous_id() {
        let inner = MemoryStore::new();
        inner.set("/data/a.bin", MARKER_OBJECT_ID, "g-old").unwrap();
        inner
            .set("/data/a.bin", MARKER_CANONICAL_PATH, "/data/a.bin")
            .unwrap();

        let store = PathWriteFails(inner);
        let markers = MarkerWriter::new(&store);

        assert!(markers.write_identity("/data/a.bin", "g-new").is_err());
        assert_eq!(
            store.get("/data/a.bin", MARKER_OBJECT_ID).unwrap().as_deref(),
            Some("g-old")
        );
    }
}
