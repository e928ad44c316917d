//! Parallel chunked upload.
//!
//! Same wire protocol as the sequential uploader, with the chunk phase fanned
//! out across a bounded set of workers. Every chunk gets its own file handle
//! and its own retry budget; the session is completed only when the
//! completed-set holds every index.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::chunk::{self, ChunkDescriptor};
use crate::config::SyncConfig;
use crate::engine::CancelToken;
use crate::errors::{SyncError, SyncResult};
use crate::progress::{ProgressSender, UploadStage};
use crate::protocol::RemoteFileRef;
use crate::remote::RemoteClient;
use crate::upload_chunked::{complete_session, init_session, read_chunk, upload_chunk};

const ERROR_SUMMARY_LIMIT: usize = 3;

async fn upload_chunk_with_retry(
    client: &RemoteClient,
    config: &SyncConfig,
    path: &Path,
    upload_id: &str,
    desc: ChunkDescriptor,
) -> SyncResult<()> {
    let attempts = config.chunk_retries.max(1);
    let mut attempt = 1;
    loop {
        // Fresh read per attempt: a failed send may have consumed the buffer.
        let result = match read_chunk(path, desc).await {
            Ok(data) => upload_chunk(client, config, upload_id, desc.index, data).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                warn!(chunk = desc.index, attempt, error = %e, "chunk attempt failed, retrying");
                tokio::time::sleep(config.retry_base_delay * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Upload a file's chunks concurrently, bounded by `config.parallel_uploads`.
///
/// The fan-out always drains fully, even after a chunk exhausts its retries,
/// so the failure report covers every chunk. Cancellation stops chunks that
/// have not started; in-flight requests run to their own outcome.
pub async fn upload(
    client: &RemoteClient,
    config: &SyncConfig,
    path: &Path,
    file_name: &str,
    total_size: u64,
    bytes_sent: &AtomicU64,
    progress: &ProgressSender,
    cancel: &CancelToken,
) -> SyncResult<RemoteFileRef> {
    let chunks = chunk::plan(total_size, config.chunk_size())?;
    let total_chunks = chunks.len();

    let upload_id = init_session(client, config, file_name, total_size, total_chunks as u32).await?;
    info!(
        file = file_name,
        session = %upload_id,
        chunks = total_chunks,
        workers = config.parallel_uploads.max(1),
        "parallel upload started"
    );

    let semaphore = Arc::new(Semaphore::new(config.parallel_uploads.max(1)));
    let completed: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
    let failures: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let session = upload_id.as_str();

    let workers = chunks.iter().copied().map(|desc| {
        let semaphore = Arc::clone(&semaphore);
        let completed = &completed;
        let failures = &failures;
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            if cancel.is_cancelled() {
                failures.lock().push(format!("chunk {}: cancelled", desc.index));
                return;
            }
            match upload_chunk_with_retry(client, config, path, session, desc).await {
                Ok(()) => {
                    // Test and insert under one lock so a duplicate ack can
                    // never double-count the byte total.
                    if completed.lock().insert(desc.index) {
                        let sent = bytes_sent.fetch_add(desc.len, Ordering::Relaxed) + desc.len;
                        progress.send(UploadStage::Uploading, sent);
                    }
                }
                Err(e) => failures.lock().push(format!("chunk {}: {}", desc.index, e)),
            }
        }
    });
    futures::future::join_all(workers).await;

    let done = completed.lock().len();
    if done != total_chunks {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let mut errors = failures.into_inner();
        errors.truncate(ERROR_SUMMARY_LIMIT);
        return Err(SyncError::ChunksFailed {
            failed: total_chunks - done,
            total: total_chunks,
            errors,
        });
    }

    progress.send(UploadStage::Assembling, total_size);
    let file_ref = complete_session(client, config, &upload_id).await?;
    info!(file = file_name, id = %file_ref.id, "parallel upload complete");
    Ok(file_ref)
}
