//! Engine facade: strategy selection, dedupe, journaling, cancellation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::fingerprint;
use crate::journal::{Journal, TransferRecord, UploadStrategy};
use crate::progress::{ProgressSender, UploadProgress, UploadStage};
use crate::reconcile::{self, SyncStatus};
use crate::remote::{ConnectionStatus, RemoteClient};
use crate::{upload_chunked, upload_parallel, upload_single};

/// Cooperative cancellation flag shared between the caller and an upload.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Terminal result of one `upload_file` call.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub record: TransferRecord,
    /// True when the journal already held a completed transfer of the same
    /// content and no network transfer happened.
    pub skipped: bool,
}

/// Aggregate result of `sync_pending`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// A local backup file with no completed journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct PendingFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

pub struct SyncEngine {
    config: SyncConfig,
    client: RemoteClient,
    journal: Journal,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        let client = RemoteClient::new(&config)?;
        let journal_dir = config
            .journal_dir
            .clone()
            .unwrap_or_else(Journal::default_dir);
        let journal = Journal::open(journal_dir)?;
        Ok(Self {
            config,
            client,
            journal,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Upload one file, journaling the outcome.
    ///
    /// The file is fingerprinted first; if a completed journal record already
    /// carries the same fingerprint the upload is skipped and the prior
    /// remote reference returned. Otherwise the strategy is picked by size
    /// and configured parallelism, and the terminal status (including partial
    /// byte counts on failure) is persisted before returning.
    pub async fn upload_file(
        &self,
        path: &Path,
        progress: Option<mpsc::Sender<UploadProgress>>,
        cancel: &CancelToken,
    ) -> SyncResult<UploadOutcome> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| SyncError::from_source_io(path, e))?;
        if !metadata.is_file() {
            return Err(SyncError::SourceNotFound(path.to_path_buf()));
        }
        let total_bytes = metadata.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SyncError::SourceNotFound(path.to_path_buf()))?;

        let reporter = ProgressSender::new(file_name.clone(), total_bytes, progress);
        reporter.send(UploadStage::Hashing, 0);

        let hash_path = path.to_path_buf();
        let digest = tokio::task::spawn_blocking(move || fingerprint::fingerprint_file(&hash_path))
            .await
            .map_err(|e| SyncError::Internal(format!("hash task panicked: {}", e)))??;

        let strategy = self.pick_strategy(total_bytes);
        let mut record =
            TransferRecord::new(&file_name, path, total_bytes, &digest, strategy);

        if let Some(prior) = self.journal.find_completed(&digest) {
            info!(file = file_name, "content already uploaded, skipping");
            record.mark_skipped(&prior);
            self.journal.save(&record)?;
            reporter.send(UploadStage::Completed, total_bytes);
            return Ok(UploadOutcome {
                record,
                skipped: true,
            });
        }

        record.mark_running();
        self.journal.save(&record)?;
        reporter.send(UploadStage::Preparing, 0);

        let bytes_sent = Arc::new(AtomicU64::new(0));
        let result = match strategy {
            UploadStrategy::Single => {
                upload_single::upload(
                    &self.client,
                    path,
                    &file_name,
                    total_bytes,
                    self.config.single_upload_timeout(total_bytes),
                    Arc::clone(&bytes_sent),
                    reporter.clone(),
                )
                .await
            }
            UploadStrategy::Sequential => {
                upload_chunked::upload(
                    &self.client,
                    &self.config,
                    path,
                    &file_name,
                    total_bytes,
                    &bytes_sent,
                    &reporter,
                    cancel,
                )
                .await
            }
            UploadStrategy::Parallel => {
                upload_parallel::upload(
                    &self.client,
                    &self.config,
                    path,
                    &file_name,
                    total_bytes,
                    &bytes_sent,
                    &reporter,
                    cancel,
                )
                .await
            }
        };

        match result {
            Ok(file_ref) => {
                record.mark_completed(file_ref.id, file_ref.path);
                self.journal.save(&record)?;
                reporter.send(UploadStage::Completed, total_bytes);
                Ok(UploadOutcome {
                    record,
                    skipped: false,
                })
            }
            Err(e) => {
                error!(file = file_name, error = %e, "upload failed");
                record.mark_failed(&e, bytes_sent.load(Ordering::Relaxed));
                self.journal.save(&record)?;
                reporter.send(UploadStage::Failed, bytes_sent.load(Ordering::Relaxed));
                Err(e)
            }
        }
    }

    /// Scan the backup folder for files whose content has not been uploaded.
    ///
    /// Honors the configured extension filter; files whose fingerprint
    /// matches a completed journal record are excluded. A missing backup
    /// folder yields an empty list.
    pub async fn pending_files(&self) -> SyncResult<Vec<PendingFile>> {
        let dir = self.config.backup_dir.clone();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let extensions: Vec<String> = self
            .config
            .include_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        let done = self.journal.completed_fingerprints();

        let pending = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if !extensions.is_empty() {
                    let ext = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(str::to_lowercase);
                    if !ext.is_some_and(|e| extensions.contains(&e)) {
                        continue;
                    }
                }
                let Ok(meta) = entry.metadata() else { continue };
                match fingerprint::fingerprint_file(path) {
                    Ok(digest) if done.contains(&digest) => {}
                    Ok(_) => out.push(PendingFile {
                        path: path.to_path_buf(),
                        size: meta.len(),
                        modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    }),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "could not fingerprint, skipping");
                    }
                }
            }
            out.sort_by(|a, b| b.modified.cmp(&a.modified));
            out
        })
        .await
        .map_err(|e| SyncError::Internal(format!("scan task panicked: {}", e)))?;

        Ok(pending)
    }

    /// Upload every pending file, continuing past individual failures.
    pub async fn sync_pending(
        &self,
        progress: Option<mpsc::Sender<UploadProgress>>,
        cancel: &CancelToken,
    ) -> SyncResult<SyncSummary> {
        let pending = self.pending_files().await?;
        info!(count = pending.len(), "starting pending sync");

        let mut summary = SyncSummary::default();
        for file in pending {
            if cancel.is_cancelled() {
                summary.errors.push("sync cancelled".into());
                break;
            }
            match self.upload_file(&file.path, progress.clone(), cancel).await {
                Ok(outcome) if outcome.skipped => summary.skipped += 1,
                Ok(_) => summary.uploaded += 1,
                Err(e) => {
                    summary.failed += 1;
                    summary
                        .errors
                        .push(format!("{}: {}", file.path.display(), e));
                }
            }
        }
        Ok(summary)
    }

    /// Classify local files against the remote catalog.
    pub async fn reconcile(&self, paths: &[PathBuf]) -> SyncResult<Vec<SyncStatus>> {
        reconcile::reconcile(&self.client, paths).await
    }

    /// Check remote reachability.
    pub async fn verify_connection(&self) -> ConnectionStatus {
        self.client.probe().await
    }

    fn pick_strategy(&self, total_bytes: u64) -> UploadStrategy {
        if total_bytes < self.config.single_upload_threshold {
            UploadStrategy::Single
        } else if self.config.parallel_uploads > 1 {
            UploadStrategy::Parallel
        } else {
            UploadStrategy::Sequential
        }
    }
}
