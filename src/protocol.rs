//! Wire DTOs for the remote object store.
//!
//! The server speaks camelCase JSON and has two response shapes in the wild:
//! a flat `{ "file": ... }` and a nested `{ "data": { "file": ... } }`.
//! [`UploadResponse`] absorbs both and exposes one merge rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the remote catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteObjectInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response body of `GET /files`.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub files: Vec<RemoteObjectInfo>,
}

/// Remote identity of an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileRef {
    pub id: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadData {
    #[serde(default)]
    pub file: Option<RemoteFileRef>,
    #[serde(rename = "uploadId", default)]
    pub upload_id: Option<String>,
}

/// Normalized response for the upload endpoints (single, init, complete).
/// Also used to extract a structured message from error bodies.
#[derive(Debug, Deserialize, Default)]
pub struct UploadResponse {
    #[serde(default)]
    pub data: Option<UploadData>,
    #[serde(default)]
    pub file: Option<RemoteFileRef>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadResponse {
    /// The uploaded file reference. The nested `data.file` wins over the
    /// top-level `file` when both are present.
    pub fn into_file(self) -> Option<RemoteFileRef> {
        self.data.and_then(|d| d.file).or(self.file)
    }

    /// Session handle from an init response.
    pub fn upload_id(&self) -> Option<&str> {
        self.data.as_ref()?.upload_id.as_deref()
    }

    /// Best-effort human message from an error body.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Request body of `POST /files/upload/init`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest<'a> {
    pub filename: &'a str,
    pub file_size: u64,
    pub total_chunks: u32,
    pub mime_type: &'a str,
}
