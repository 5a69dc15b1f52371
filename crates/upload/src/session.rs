use std::path::PathBuf;

use skiff_protocol::{ChunkAck, part_uri};
use skiff_transport::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::DEFAULT_CHUNK_SIZE;

/// What to do when the server's per-chunk hash echo disagrees with ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Treat a mismatch as fatal for the session.
    #[default]
    Enforce,
    /// Trust the transport and ignore the echo.
    Ignore,
}

/// Per-uploader options.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Fixed chunk size for every session.
    pub chunk_size: usize,
    pub checksum_policy: ChecksumPolicy,
    pub retry: RetryPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            checksum_policy: ChecksumPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One file to upload.
#[derive(Debug, Clone, Default)]
pub struct UploadTask {
    pub bucket_id: String,
    pub user_id: String,
    pub file_path: PathBuf,
    /// Subdirectory prefix on the server; a trailing slash is stripped.
    pub path_prefix: String,
    /// Version the caller last saw for this object. When absent, the sidecar
    /// marker from the previous session is used instead.
    pub previous_version: Option<String>,
    /// Cancels the session between chunks.
    pub cancel: CancellationToken,
}

impl UploadTask {
    pub fn new(
        bucket_id: impl Into<String>,
        user_id: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            user_id: user_id.into(),
            file_path: file_path.into(),
            ..Self::default()
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every chunk was accepted, including the final one.
    Done,
    /// A definitive rejection, exhausted retries, or broken local input.
    Failed,
    /// The source file changed mid-upload, or the caller cancelled.
    Aborted,
}

/// Terminal result of one upload session.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub end: SessionEnd,
    /// Status of the last HTTP exchange; 0 when no request was made.
    pub status: u16,
    pub success: bool,
    pub message: String,
    /// Last acknowledgement the server sent, when there was one.
    pub ack: Option<ChunkAck>,
}

impl UploadOutcome {
    pub(crate) fn done(status: u16, ack: Option<ChunkAck>) -> Self {
        Self {
            end: SessionEnd::Done,
            status,
            success: true,
            message: "upload complete".into(),
            ack,
        }
    }

    pub(crate) fn failed(status: u16, message: impl Into<String>, ack: Option<ChunkAck>) -> Self {
        Self {
            end: SessionEnd::Failed,
            status,
            success: false,
            message: message.into(),
            ack,
        }
    }

    pub(crate) fn aborted(status: u16, message: impl Into<String>, ack: Option<ChunkAck>) -> Self {
        Self {
            end: SessionEnd::Aborted,
            status,
            success: false,
            message: message.into(),
            ack,
        }
    }

    pub(crate) fn not_found(path: &std::path::Path) -> Self {
        Self::failed(404, format!("file not found: {}", path.display()), None)
    }

    pub(crate) fn empty_file(path: &std::path::Path) -> Self {
        Self::failed(0, format!("file is empty: {}", path.display()), None)
    }
}

/// Mutable chunk-loop state, exclusively owned by the state machine.
#[derive(Debug)]
pub(crate) struct ChunkUploadState {
    /// Index of the chunk about to be sent; incremented by exactly one after
    /// each accepted response, never decremented.
    pub part_number: u64,
    pub is_first_chunk: bool,
    pub is_last_chunk: bool,
    /// URI the next chunk posts to; rewritten to embed the upload id and
    /// 1-based part index once the server has assigned them.
    pub request_uri: String,
    /// Server-issued object id; mirrors the guid of the last recorded
    /// response, or a sidecar marker before the first response arrives.
    pub object_guid: Option<String>,
    pub last_response: Option<ChunkAck>,
}

impl ChunkUploadState {
    pub fn new(base_uri: String, single_chunk: bool, known_object_id: Option<String>) -> Self {
        Self {
            part_number: 0,
            is_first_chunk: true,
            is_last_chunk: single_chunk,
            request_uri: base_uri,
            object_guid: known_object_id,
            last_response: None,
        }
    }

    /// Records an accepted response, mirroring its guid into `object_guid`.
    pub fn record_response(&mut self, ack: ChunkAck) {
        if !ack.guid.is_empty() {
            self.object_guid = Some(ack.guid.clone());
        }
        self.last_response = Some(ack);
    }

    /// Upload id from the last response, once the server has assigned one.
    pub fn upload_id(&self) -> Option<&str> {
        self.last_response
            .as_ref()
            .filter(|ack| !ack.upload_id.is_empty())
            .map(|ack| ack.upload_id.as_str())
    }

    pub fn mark_last(&mut self) {
        self.is_last_chunk = true;
    }

    pub fn advance_part(&mut self) {
        self.part_number += 1;
    }

    /// Points the request URI at the chunk about to be sent. A no-op until
    /// the server has assigned an upload id.
    pub fn refresh_uri(&mut self, base: &str) {
        if let Some(upload_id) = self.upload_id() {
            self.request_uri = part_uri(base, upload_id, self.part_number + 1);
        }
    }
}
