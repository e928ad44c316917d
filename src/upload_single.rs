//! Single-request streaming upload for small files.

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::errors::{SyncError, SyncResult};
use crate::progress::{ProgressSender, UploadStage};
use crate::protocol::{RemoteFileRef, UploadResponse};
use crate::remote::{check_status, classify_transport, RemoteClient};

const STREAM_BUFFER_SIZE: usize = 1024 * 1024;

/// Upload one file as a single multipart request.
///
/// The body is streamed from disk through a 1 MiB reader so memory use stays
/// flat. `bytes_sent` is advanced as the body is read, which also feeds the
/// progress channel; on failure it holds the partial count for the journal.
pub async fn upload(
    client: &RemoteClient,
    path: &Path,
    file_name: &str,
    total_size: u64,
    timeout: Duration,
    bytes_sent: Arc<AtomicU64>,
    progress: ProgressSender,
) -> SyncResult<RemoteFileRef> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SyncError::from_source_io(path, e))?;

    let reader = ReaderStream::with_capacity(file, STREAM_BUFFER_SIZE);
    let counted = reader.map(move |item| {
        if let Ok(bytes) = &item {
            let sent = bytes_sent.fetch_add(bytes.len() as u64, Ordering::Relaxed)
                + bytes.len() as u64;
            progress.send(UploadStage::Uploading, sent);
        }
        item
    });

    let part = Part::stream_with_length(Body::wrap_stream(counted), total_size)
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")
        .map_err(|e| SyncError::Internal(format!("invalid mime type: {}", e)))?;
    let form = Form::new().part("files", part);

    let url = client.endpoint("files/upload")?;
    let response = client
        .http()
        .post(url)
        .multipart(form)
        .timeout(timeout)
        .send()
        .await
        .map_err(classify_transport)?;
    let response = check_status(response).await?;

    let body: UploadResponse = response.json().await.map_err(classify_transport)?;
    let file_ref = body
        .into_file()
        .ok_or_else(|| SyncError::Protocol("upload response carries no file reference".into()))?;

    info!(file = file_name, id = %file_ref.id, "single upload complete");
    Ok(file_ref)
}
