//! Per-file sidecar metadata.
//!
//! Uploads remember three things about a file between sessions: the object id
//! the server issued for it, the canonical path the id was issued for, and
//! the last version string the server accepted. The store keeps named string
//! attributes per file path; integrators may back it with extended
//! attributes, NTFS alternate streams, or a local database. Two
//! implementations ship here: an in-memory map and a JSON file.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Marker holding the server-issued object id for a file.
pub const MARKER_OBJECT_ID: &str = "object_id";

/// Marker holding the path the object id was issued for. A copied file
/// carries the id marker along; a mismatching path marker exposes the copy.
pub const MARKER_CANONICAL_PATH: &str = "canonical_path";

/// Marker holding the last version string the server accepted.
pub const MARKER_LAST_VERSION: &str = "last_version";

/// Errors from sidecar storage.
#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Named string attributes keyed by file path.
///
/// Implementations must be safe for concurrent use across distinct paths;
/// no ordering is guaranteed between writers of the same path.
pub trait SidecarStore: Send + Sync {
    /// Returns the attribute value, or `None` when unset.
    fn get(&self, path: &str, key: &str) -> Result<Option<String>, SidecarError>;

    /// Sets the attribute, overwriting any previous value.
    fn set(&self, path: &str, key: &str, value: &str) -> Result<(), SidecarError>;

    /// Removes the attribute if present.
    fn remove(&self, path: &str, key: &str) -> Result<(), SidecarError>;

    /// True when the attribute is set.
    fn exists(&self, path: &str, key: &str) -> Result<bool, SidecarError> {
        Ok(self.get(path, key)?.is_some())
    }
}
