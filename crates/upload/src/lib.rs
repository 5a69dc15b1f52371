//! Resumable chunked-upload orchestrator.
//!
//! [`Uploader`] drives one file at a time to the storage server: the file is
//! split into fixed-size chunks, each chunk becomes one multipart POST sent
//! through the retrying transport, and the server's acknowledgements steer
//! the session — the first ack assigns the object id, later request URIs
//! embed the upload id and part index, and the final chunk carries the
//! aggregate hash list. Sidecar markers written on completion let a later
//! session recognize the same file and reuse its object id.
//!
//! A session never holds the source file open across a network round-trip,
//! so external edits stay visible; the conflict guard aborts the session when
//! the file's modification time moves.

mod auth;
mod checksum;
mod guard;
mod machine;
mod marker;
mod session;
mod source;
mod version;

pub use auth::login;
pub use checksum::{ChecksumLedger, chunk_hash};
pub use guard::{ConflictGuard, Freshness};
pub use marker::MarkerWriter;
pub use session::{
    ChecksumPolicy, SessionEnd, UploadOptions, UploadOutcome, UploadTask,
};
pub use source::{ChunkSource, SourceError};
pub use version::VersionSource;

use std::sync::Arc;

use skiff_sidecar::SidecarStore;
use skiff_transport::RetryingClient;

/// Default chunk size: files above this are split into parts.
pub const DEFAULT_CHUNK_SIZE: usize = 2_000_000;

/// Errors produced by the upload crate.
///
/// Most terminal conditions are reported through [`UploadOutcome`], not here;
/// an `Err` from [`Uploader::upload`] means the session hit something the
/// caller must treat as fatal (a hash the server disagrees on, broken local
/// I/O, a failing sidecar store).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk source error: {0}")]
    Source(#[from] source::SourceError),

    #[error("transport error: {0}")]
    Transport(#[from] skiff_transport::TransportError),

    #[error("sidecar error: {0}")]
    Sidecar(#[from] skiff_sidecar::SidecarError),

    #[error("chunk {part} hash mismatch: sent {local}, server echoed {remote}")]
    ChecksumMismatch {
        part: u64,
        local: String,
        remote: String,
    },

    #[error("blocking task failed: {0}")]
    TaskJoin(String),
}

/// Client for uploading files to one storage host.
///
/// Holds the host, the authenticated transport, the sidecar store and the
/// version source; each [`upload`](Uploader::upload) call runs an independent
/// session. Sessions for different files may run concurrently.
pub struct Uploader {
    host: String,
    transport: RetryingClient,
    sidecar: Arc<dyn SidecarStore>,
    versions: Arc<dyn VersionSource>,
    opts: UploadOptions,
}

impl Uploader {
    /// Creates an uploader with default options.
    pub fn new(
        host: impl Into<String>,
        token: &str,
        sidecar: Arc<dyn SidecarStore>,
        versions: Arc<dyn VersionSource>,
    ) -> Result<Self, UploadError> {
        Self::with_options(host, token, sidecar, versions, UploadOptions::default())
    }

    /// Creates an uploader with explicit chunk-size, checksum and retry options.
    pub fn with_options(
        host: impl Into<String>,
        token: &str,
        sidecar: Arc<dyn SidecarStore>,
        versions: Arc<dyn VersionSource>,
        opts: UploadOptions,
    ) -> Result<Self, UploadError> {
        let transport = RetryingClient::new(token, opts.retry.clone())?;
        Ok(Self {
            host: host.into(),
            transport,
            sidecar,
            versions,
            opts,
        })
    }

    /// Uploads one file, returning the terminal outcome.
    ///
    /// Every terminal condition — including a missing source file, which maps
    /// to a 404-style outcome — comes back as `Ok`. An `Err` is reserved for
    /// conditions the caller must treat as fatal for the session, such as a
    /// chunk hash the server contradicts while the enforcing checksum policy
    /// is active.
    pub async fn upload(&self, task: UploadTask) -> Result<UploadOutcome, UploadError> {
        machine::run_session(
            &self.host,
            &self.transport,
            self.sidecar.as_ref(),
            self.versions.as_ref(),
            &self.opts,
            &task,
        )
        .await
    }
}
