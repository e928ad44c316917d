//! Resumable cloud backup upload engine.
//!
//! Uploads local backup files to a remote object store over HTTP, picking a
//! strategy by size: small files go up in one streaming multipart request,
//! large files through a three-phase chunked protocol, sequentially or with a
//! bounded parallel fan-out. Every session is journaled to disk, and content
//! fingerprints make repeat uploads of unchanged files no-ops.
//!
//! ```no_run
//! use cloudsync::{CancelToken, SyncConfig, SyncEngine};
//!
//! # async fn run() -> cloudsync::SyncResult<()> {
//! let config = SyncConfig {
//!     base_url: "https://backup.example.com/api".into(),
//!     api_key: std::env::var("BACKUP_API_KEY").unwrap_or_default(),
//!     ..Default::default()
//! };
//! let engine = SyncEngine::new(config)?;
//! let outcome = engine
//!     .upload_file("nightly.bak".as_ref(), None, &CancelToken::new())
//!     .await?;
//! println!("uploaded as {:?}", outcome.record.remote_id);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod journal;
pub mod progress;
pub mod protocol;
pub mod reconcile;
pub mod remote;
pub mod upload_chunked;
pub mod upload_parallel;
pub mod upload_single;

pub use config::SyncConfig;
pub use engine::{CancelToken, PendingFile, SyncEngine, SyncSummary, UploadOutcome};
pub use errors::{SyncError, SyncResult};
pub use journal::{Journal, TransferRecord, TransferStatus, UploadStrategy};
pub use progress::{UploadProgress, UploadStage};
pub use protocol::{RemoteFileRef, RemoteObjectInfo};
pub use reconcile::{SyncState, SyncStatus};
pub use remote::{ConnectionStatus, RemoteClient};
