//! Engine configuration.
//!
//! A `SyncConfig` is built by the host application and passed explicitly to
//! [`crate::engine::SyncEngine::new`]. There is no process-wide configuration
//! state; two engines with different configs can coexist in one process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default chunk size in MiB for chunked uploads.
pub const DEFAULT_CHUNK_SIZE_MB: u64 = 10;

/// Default number of concurrent chunk workers.
pub const DEFAULT_PARALLEL_UPLOADS: usize = 4;

/// Default per-chunk retry attempts in the parallel uploader.
pub const DEFAULT_CHUNK_RETRIES: u32 = 3;

/// Files below this size go up in a single multipart request.
pub const DEFAULT_SINGLE_UPLOAD_THRESHOLD: u64 = 50 * 1024 * 1024;

const HUNDRED_MIB: u64 = 100 * 1024 * 1024;

/// Configuration for a [`crate::engine::SyncEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the remote object store, e.g. `https://backup.example.com/api`.
    pub base_url: String,
    /// API key sent as `X-API-Key` on every request.
    pub api_key: String,
    /// Accept self-signed certificates. Only for private deployments.
    pub accept_invalid_certs: bool,
    /// Chunk size in MiB for chunked uploads. Clamped to at least 1.
    pub chunk_size_mb: u64,
    /// Width of the parallel chunk fan-out. `1` selects the sequential uploader.
    pub parallel_uploads: usize,
    /// Per-chunk attempts in the parallel uploader.
    pub chunk_retries: u32,
    /// Files at or above this many bytes use the chunked protocol.
    pub single_upload_threshold: u64,
    /// Local folder scanned by `pending_files`.
    pub backup_dir: PathBuf,
    /// File extensions (without dot, case-insensitive) included in the scan.
    /// Empty means every file.
    pub include_extensions: Vec<String>,
    /// Journal directory. `None` uses the platform data directory.
    pub journal_dir: Option<PathBuf>,
    /// Timeout for catalog requests (list, delete, download).
    #[serde(with = "duration_secs")]
    pub catalog_timeout: Duration,
    /// Timeout for the chunked-upload init request.
    #[serde(with = "duration_secs")]
    pub init_timeout: Duration,
    /// Timeout for each chunk request.
    #[serde(with = "duration_secs")]
    pub chunk_timeout: Duration,
    /// Timeout for the chunked-upload complete request.
    #[serde(with = "duration_secs")]
    pub complete_timeout: Duration,
    /// Baseline timeout for single-request uploads; scaled up by file size.
    #[serde(with = "duration_secs")]
    pub base_upload_timeout: Duration,
    /// Base delay for chunk retry backoff (delay = base * attempt).
    #[serde(with = "duration_secs")]
    pub retry_base_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            accept_invalid_certs: false,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            parallel_uploads: DEFAULT_PARALLEL_UPLOADS,
            chunk_retries: DEFAULT_CHUNK_RETRIES,
            single_upload_threshold: DEFAULT_SINGLE_UPLOAD_THRESHOLD,
            backup_dir: PathBuf::new(),
            include_extensions: Vec::new(),
            journal_dir: None,
            catalog_timeout: Duration::from_secs(120),
            init_timeout: Duration::from_secs(120),
            chunk_timeout: Duration::from_secs(180),
            complete_timeout: Duration::from_secs(300),
            base_upload_timeout: Duration::from_secs(300),
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl SyncConfig {
    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size_mb.max(1) * 1024 * 1024
    }

    /// Timeout for a single-request upload of `total_bytes`.
    ///
    /// Baseline plus one minute for every started 100 MiB, so a 250 MiB file
    /// gets three extra minutes.
    pub fn single_upload_timeout(&self, total_bytes: u64) -> Duration {
        let extra_minutes = total_bytes.div_ceil(HUNDRED_MIB);
        self.base_upload_timeout + Duration::from_secs(60 * extra_minutes)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_clamps_to_one_mib() {
        let mut config = SyncConfig::default();
        config.chunk_size_mb = 0;
        assert_eq!(config.chunk_size(), 1024 * 1024);
    }

    #[test]
    fn upload_timeout_scales_with_size() {
        let config = SyncConfig::default();
        assert_eq!(config.single_upload_timeout(0), Duration::from_secs(300));
        // 50 MiB starts one 100 MiB window
        assert_eq!(
            config.single_upload_timeout(50 * 1024 * 1024),
            Duration::from_secs(360)
        );
        // 250 MiB starts three
        assert_eq!(
            config.single_upload_timeout(250 * 1024 * 1024),
            Duration::from_secs(480)
        );
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SyncConfig {
            base_url: "https://backup.example.com/api".into(),
            api_key: "k".into(),
            chunk_timeout: Duration::from_secs(42),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base_url, config.base_url);
        assert_eq!(back.chunk_timeout, Duration::from_secs(42));
    }
}
