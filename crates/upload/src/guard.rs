use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Result of a mid-session mutation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Unchanged,
    Changed(String),
}

/// Detects mutation of the source file after the session began.
///
/// The modification time is captured once at session start and compared
/// exactly on every check — any difference, sub-second included, counts as
/// changed. A file that disappeared counts as changed too.
pub struct ConflictGuard {
    path: PathBuf,
    original_modified: SystemTime,
}

impl ConflictGuard {
    pub fn new(path: &Path, original_modified: SystemTime) -> Self {
        Self {
            path: path.to_path_buf(),
            original_modified,
        }
    }

    /// Compares the file's current modification time to the captured one.
    pub fn check(&self) -> Result<Freshness, std::io::Error> {
        let current = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Freshness::Changed(format!(
                    "file {} was removed during upload",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e),
        };

        if current != self.original_modified {
            return Ok(Freshness::Changed(format!(
                "file {} was modified during upload",
                self.path.display()
            )));
        }
        Ok(Freshness::Unchanged)
    }
}
