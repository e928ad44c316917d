//! Sequential chunked upload.
//!
//! Three-phase protocol: init a session, POST each chunk, then complete. The
//! phase helpers here are shared with the parallel uploader, which layers its
//! own scheduling and retry on top.

use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::info;

use crate::chunk::{self, ChunkDescriptor};
use crate::config::SyncConfig;
use crate::engine::CancelToken;
use crate::errors::{SyncError, SyncResult};
use crate::progress::{ProgressSender, UploadStage};
use crate::protocol::{InitRequest, RemoteFileRef, UploadResponse};
use crate::remote::{check_status, classify_transport, RemoteClient};

/// Open a chunked upload session, returning the server's session handle.
pub(crate) async fn init_session(
    client: &RemoteClient,
    config: &SyncConfig,
    file_name: &str,
    total_size: u64,
    total_chunks: u32,
) -> SyncResult<String> {
    let request = InitRequest {
        filename: file_name,
        file_size: total_size,
        total_chunks,
        mime_type: "application/octet-stream",
    };

    let url = client.endpoint("files/upload/init")?;
    let response = client
        .http()
        .post(url)
        .json(&request)
        .timeout(config.init_timeout)
        .send()
        .await
        .map_err(classify_transport)?;
    let response = check_status(response).await?;

    let body: UploadResponse = response.json().await.map_err(classify_transport)?;
    body.upload_id()
        .map(str::to_owned)
        .ok_or_else(|| SyncError::Protocol("init response carries no uploadId".into()))
}

/// POST one chunk of an open session.
pub(crate) async fn upload_chunk(
    client: &RemoteClient,
    config: &SyncConfig,
    upload_id: &str,
    index: u32,
    data: Vec<u8>,
) -> SyncResult<()> {
    let part = Part::bytes(data)
        .file_name("chunk")
        .mime_str("application/octet-stream")
        .map_err(|e| SyncError::Internal(format!("invalid mime type: {}", e)))?;
    let form = Form::new()
        .part("chunk", part)
        .text("chunkIndex", index.to_string());

    let url = client.endpoint(&format!("files/upload/chunk/{}", upload_id))?;
    let response = client
        .http()
        .post(url)
        .multipart(form)
        .timeout(config.chunk_timeout)
        .send()
        .await
        .map_err(classify_transport)?;
    check_status(response).await?;
    Ok(())
}

/// Close the session and return the assembled file's remote reference.
pub(crate) async fn complete_session(
    client: &RemoteClient,
    config: &SyncConfig,
    upload_id: &str,
) -> SyncResult<RemoteFileRef> {
    let url = client.endpoint(&format!("files/upload/complete/{}", upload_id))?;
    let response = client
        .http()
        .post(url)
        .timeout(config.complete_timeout)
        .send()
        .await
        .map_err(classify_transport)?;
    let response = check_status(response).await?;

    let body: UploadResponse = response.json().await.map_err(classify_transport)?;
    body.into_file()
        .ok_or_else(|| SyncError::Protocol("complete response carries no file reference".into()))
}

/// Read one chunk's byte range through its own file handle, so concurrent
/// readers never disturb each other's cursor.
pub(crate) async fn read_chunk(path: &Path, desc: ChunkDescriptor) -> SyncResult<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(desc.offset)).await?;
    let mut buffer = vec![0u8; desc.len as usize];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}

/// Upload a file chunk by chunk, in index order.
///
/// The first failed chunk aborts the session; the session is completed only
/// after every chunk is on the server. A failed complete is terminal, the
/// chunks are not re-sent.
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
    let total_chunks = chunks.len() as u32;

    let upload_id = init_session(client, config, file_name, total_size, total_chunks).await?;
    info!(file = file_name, session = %upload_id, chunks = total_chunks, "chunked upload started");

    for desc in chunks {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let data = read_chunk(path, desc).await?;
        upload_chunk(client, config, &upload_id, desc.index, data).await?;

        let sent = bytes_sent.fetch_add(desc.len, Ordering::Relaxed) + desc.len;
        progress.send(UploadStage::Uploading, sent);
    }

    progress.send(UploadStage::Assembling, total_size);
    let file_ref = complete_session(client, config, &upload_id).await?;
    info!(file = file_name, id = %file_ref.id, "chunked upload complete");
    Ok(file_ref)
}
