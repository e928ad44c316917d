//! HTTP client for the remote object store.
//!
//! One `RemoteClient` wraps one `reqwest::Client` with the API key installed
//! as a default header. Catalog operations live here; the uploaders reuse the
//! same client through the crate-internal accessors.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Response, StatusCode, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::protocol::{ListResponse, RemoteObjectInfo, UploadResponse};

const API_KEY_HEADER: &str = "X-API-Key";

/// Result of [`RemoteClient::probe`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub remote_files: usize,
    pub message: String,
}

pub struct RemoteClient {
    base_url: Url,
    http: Client,
    catalog_timeout: Duration,
}

impl RemoteClient {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SyncError::Auth("API key is not configured".into()));
        }

        // The URL crate treats the last path segment as a file unless the
        // base ends with a slash, which would silently drop "/api" on join.
        let normalized = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| SyncError::Auth("API key contains invalid header characters".into()))?;
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http,
            catalog_timeout: config.catalog_timeout,
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> SyncResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", path, e)))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    async fn fetch_catalog(&self, folder: Option<&str>) -> SyncResult<ListResponse> {
        let mut url = self.endpoint("files")?;
        if let Some(folder) = folder {
            url.query_pairs_mut().append_pair("path", folder);
        }

        let response = self
            .http
            .get(url)
            .timeout(self.catalog_timeout)
            .send()
            .await
            .map_err(classify_transport)?;
        let response = check_status(response).await?;
        let body: ListResponse = response.json().await.map_err(classify_transport)?;
        debug!(count = body.files.len(), "remote catalog listed");
        Ok(body)
    }

    /// List the remote catalog, optionally scoped to a folder.
    pub async fn list(&self, folder: Option<&str>) -> SyncResult<Vec<RemoteObjectInfo>> {
        Ok(self.fetch_catalog(folder).await?.files)
    }

    /// Delete a remote file by id.
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        let url = self.endpoint(&format!("files/{}", id))?;
        let response = self
            .http
            .delete(url)
            .timeout(self.catalog_timeout)
            .send()
            .await
            .map_err(classify_transport)?;
        check_status(response).await?;
        Ok(())
    }

    /// Download a remote file into `dest_dir`, returning the written path.
    ///
    /// The filename comes from `Content-Disposition`; absent that, the file is
    /// written as `backup_{id}`.
    pub async fn download(&self, id: &str, dest_dir: &Path) -> SyncResult<PathBuf> {
        let url = self.endpoint(&format!("files/{}/download", id))?;
        let response = self
            .http
            .get(url)
            .timeout(self.catalog_timeout)
            .send()
            .await
            .map_err(classify_transport)?;
        let mut response = check_status(response).await?;

        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .unwrap_or_else(|| format!("backup_{}", id));

        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(&file_name);
        let mut file = tokio::fs::File::create(&dest).await?;

        while let Some(bytes) = response.chunk().await.map_err(classify_transport)? {
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        debug!(path = %dest.display(), "download complete");
        Ok(dest)
    }

    /// Check reachability of the remote store. Never returns an error; a
    /// failed probe is reported in the status.
    pub async fn probe(&self) -> ConnectionStatus {
        match self.fetch_catalog(None).await {
            Ok(body) => {
                // The server's total can exceed one listing page.
                let count = body.total.map(|t| t as usize).unwrap_or(body.files.len());
                ConnectionStatus {
                    connected: true,
                    remote_files: count,
                    message: format!("connected, {} remote files", count),
                }
            }
            Err(e) => {
                warn!(error = %e, "connection probe failed");
                ConnectionStatus {
                    connected: false,
                    remote_files: 0,
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Map a reqwest transport error onto the sync taxonomy.
pub(crate) fn classify_transport(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        return SyncError::Timeout(err.to_string());
    }
    if is_tls(&err) {
        return SyncError::Tls(err.to_string());
    }
    if err.is_connect() {
        return SyncError::ConnectionFailed(err.to_string());
    }
    if err.is_body() || err.is_request() || err.is_decode() {
        return SyncError::TransmissionInterrupted(err.to_string());
    }
    SyncError::ConnectionFailed(err.to_string())
}

fn is_tls(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        let text = inner.to_string();
        if text.contains("certificate") || text.contains("TLS") || text.contains("tls")
            || text.contains("handshake")
        {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Turn a non-success response into a classified error, preferring the
/// server's structured message over the raw body.
pub(crate) async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<UploadResponse>(&raw)
        .ok()
        .and_then(|b| b.error_message().map(str::to_owned))
        .unwrap_or(raw);

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::Auth(message));
    }
    Err(SyncError::Server {
        status: status.as_u16(),
        message,
    })
}

fn disposition_filename(header: &str) -> Option<String> {
    // attachment; filename="db.bak"  or  filename=db.bak
    let part = header
        .split(';')
        .map(str::trim)
        .find(|p| p.starts_with("filename="))?;
    let value = part.trim_start_matches("filename=").trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> SyncConfig {
        SyncConfig {
            base_url: base.into(),
            api_key: "test-key".into(),
            ..Default::default()
        }
    }

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let client = RemoteClient::new(&config("https://backup.example.com/api")).unwrap();
        let url = client.endpoint("files/upload").unwrap();
        assert_eq!(url.as_str(), "https://backup.example.com/api/files/upload");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let mut c = config("https://backup.example.com");
        c.api_key = "  ".into();
        assert!(matches!(RemoteClient::new(&c), Err(SyncError::Auth(_))));
    }

    #[test]
    fn garbage_base_url_is_rejected() {
        assert!(matches!(
            RemoteClient::new(&config("not a url")),
            Err(SyncError::InvalidUrl(_))
        ));
    }

    #[test]
    fn disposition_parsing() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="db.bak""#),
            Some("db.bak".into())
        );
        assert_eq!(
            disposition_filename("attachment; filename=plain.txt"),
            Some("plain.txt".into())
        );
        assert_eq!(disposition_filename("attachment"), None);
    }
}
