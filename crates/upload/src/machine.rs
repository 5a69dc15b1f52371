//! The chunk loop: one multipart POST per chunk, driven by server replies.

use tracing::{debug, info, warn};

use skiff_protocol::{
    ChunkAck, ChunkPayload, ContentRange, PARAM_GUID, PARAM_PART_NUMBER, PARAM_PREFIX,
    PARAM_USER_ID, PARAM_VERSION, upload_uri,
};
use skiff_sidecar::SidecarStore;
use skiff_transport::RetryingClient;

use crate::UploadError;
use crate::checksum::{ChecksumLedger, chunk_hash};
use crate::guard::{ConflictGuard, Freshness};
use crate::marker::MarkerWriter;
use crate::session::{
    ChecksumPolicy, ChunkUploadState, UploadOptions, UploadOutcome, UploadTask,
};
use crate::source::{ChunkSource, SourceError};
use crate::version::VersionSource;

pub(crate) async fn run_session(
    host: &str,
    transport: &RetryingClient,
    sidecar: &dyn SidecarStore,
    versions: &dyn VersionSource,
    opts: &UploadOptions,
    task: &UploadTask,
) -> Result<UploadOutcome, UploadError> {
    let path = task.file_path.as_path();
    let path_key = path.to_string_lossy().into_owned();

    let mut source = match ChunkSource::open(path, opts.chunk_size, 0) {
        Ok(source) => source,
        Err(SourceError::NotFound(p)) => {
            warn!(file = %p.display(), "upload refused: file not found");
            return Ok(UploadOutcome::not_found(&p));
        }
        Err(SourceError::Empty(p)) => {
            warn!(file = %p.display(), "upload refused: file is empty");
            return Ok(UploadOutcome::empty_file(&p));
        }
        Err(SourceError::Io(e)) => return Err(UploadError::Io(e)),
    };
    let file_len = source.file_len();

    // Captured before the first chunk; the guard compares against this for
    // the rest of the session.
    let original_modified = std::fs::metadata(path)?.modified()?;
    let guard = ConflictGuard::new(path, original_modified);

    let markers = MarkerWriter::new(sidecar);
    let known_object_id = markers.recall_object_id(&path_key)?;
    if let Some(id) = &known_object_id {
        debug!(file = %path_key, object_id = %id, "reusing object id from sidecar markers");
    }

    let previous_version = match &task.previous_version {
        Some(v) => Some(v.clone()),
        None => markers.recall_version(&path_key)?,
    };
    let version = versions.increment(&task.user_id, previous_version.as_deref());

    let prefix = task.path_prefix.trim_end_matches('/').to_string();
    let base_uri = upload_uri(host, &task.bucket_id);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_key.clone());

    let mut state = ChunkUploadState::new(
        base_uri.clone(),
        file_len < opts.chunk_size as u64,
        known_object_id,
    );
    let mut ledger = ChecksumLedger::new();

    info!(
        file = %path_key,
        bytes = file_len,
        chunk_size = opts.chunk_size,
        "upload session started"
    );

    loop {
        if task.cancel.is_cancelled() {
            info!(file = %path_key, "upload cancelled between chunks");
            return Ok(UploadOutcome::aborted(
                0,
                "upload cancelled",
                state.last_response.clone(),
            ));
        }

        // Each read opens and closes the file on the blocking pool; nothing
        // stays open across the network round-trip below.
        let (returned, read) = tokio::task::spawn_blocking(move || {
            let mut source = source;
            let chunk = source.next_chunk();
            (source, chunk)
        })
        .await
        .map_err(|e| UploadError::TaskJoin(e.to_string()))?;
        source = returned;

        let Some(bytes) = read? else { break };

        let hash = chunk_hash(&bytes);
        ledger.push(hash.clone());
        if bytes.len() < opts.chunk_size {
            state.mark_last();
        }

        let percent = (state.part_number * opts.chunk_size as u64) as f64 / file_len as f64 * 100.0;
        info!(
            file = %path_key,
            part = state.part_number,
            last = state.is_last_chunk,
            "uploading part ({percent:.1}% sent)"
        );

        state.refresh_uri(&base_uri);

        let mut params = vec![
            (PARAM_USER_ID.to_string(), task.user_id.clone()),
            (PARAM_VERSION.to_string(), version.clone()),
            (PARAM_PREFIX.to_string(), prefix.clone()),
        ];
        if let Some(guid) = &state.object_guid {
            params.push((PARAM_GUID.to_string(), guid.clone()));
        }
        params.push((PARAM_PART_NUMBER.to_string(), state.part_number.to_string()));

        let payload = ChunkPayload {
            params,
            file_name: file_name.clone(),
            bytes,
            chunk_hash: hash.clone(),
            range: ContentRange::for_part(state.part_number, opts.chunk_size as u64, file_len),
            etags: state.is_last_chunk.then(|| ledger.etags()),
        };

        let reply = transport.send(&state.request_uri, || payload.clone()).await;

        if reply.status == 206 {
            // "More expected": identical to acceptance, except no
            // server-assigned state advances. A paginated final chunk is
            // terminal as-is.
            if state.is_last_chunk {
                info!(file = %path_key, "final chunk acknowledged as partial content");
                return Ok(UploadOutcome::done(reply.status, reply.parse().ok()));
            }
            state.advance_part();
            if let Freshness::Changed(message) = guard.check()? {
                warn!(file = %path_key, %message, "aborting upload");
                return Ok(UploadOutcome::aborted(
                    reply.status,
                    message,
                    state.last_response.clone(),
                ));
            }
            continue;
        }

        if !reply.is_success() {
            warn!(
                file = %path_key,
                part = state.part_number,
                status = reply.status,
                body = %reply.body,
                "chunk rejected"
            );
            return Ok(UploadOutcome::failed(
                reply.status,
                reply.body.clone(),
                state.last_response.clone(),
            ));
        }

        let ack: ChunkAck = match reply.parse() {
            Ok(ack) => ack,
            Err(e) => {
                warn!(
                    file = %path_key,
                    status = reply.status,
                    error = %e,
                    "unparseable server response"
                );
                return Ok(UploadOutcome::failed(
                    reply.status,
                    format!("unparseable server response: {e}"),
                    state.last_response.clone(),
                ));
            }
        };

        if opts.checksum_policy == ChecksumPolicy::Enforce
            && !ack.md5.is_empty()
            && ack.md5 != hash
        {
            return Err(UploadError::ChecksumMismatch {
                part: state.part_number,
                local: hash,
                remote: ack.md5,
            });
        }

        state.record_response(ack);

        if state.is_first_chunk {
            state.is_first_chunk = false;
            if let Some(guid) = &state.object_guid {
                debug!(file = %path_key, object_id = %guid, "object id assigned");
            }
        }

        if state.is_last_chunk {
            let accepted_version = state
                .last_response
                .as_ref()
                .map(|ack| ack.version.clone())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| version.clone());

            if let Some(object_id) = &state.object_guid {
                markers.write_identity(&path_key, object_id)?;
            }
            markers.write_version(&path_key, &accepted_version)?;

            info!(
                file = %path_key,
                parts = state.part_number + 1,
                version = %accepted_version,
                "upload complete"
            );
            return Ok(UploadOutcome::done(reply.status, state.last_response.clone()));
        }

        state.advance_part();

        if let Freshness::Changed(message) = guard.check()? {
            warn!(file = %path_key, %message, "aborting upload");
            return Ok(UploadOutcome::aborted(
                reply.status,
                message,
                state.last_response.clone(),
            ));
        }
    }

    // The source drained without a final-chunk acceptance; only reachable
    // when the file shrank between reads.
    Ok(UploadOutcome::failed(
        0,
        "chunk iteration ended before the final chunk",
        state.last_response.clone(),
    ))
}
