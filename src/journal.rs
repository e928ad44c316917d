//! Durable transfer journal.
//!
//! Every upload session gets one JSON record on disk, written atomically via
//! a temp file and rename. The in-memory index is rebuilt from those files on
//! open, which is what lets a restarted process skip files it already
//! uploaded: `find_completed` matches on content fingerprint.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{SyncError, SyncResult};

/// Lifecycle of one journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// Upload strategy the engine picked for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStrategy {
    Single,
    Sequential,
    Parallel,
}

/// One upload session, persisted as `<id>.json` in the journal directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: String,
    pub file_name: String,
    pub source_path: PathBuf,
    pub total_bytes: u64,
    pub fingerprint: String,
    pub strategy: UploadStrategy,
    pub status: TransferStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub bytes_transferred: u64,
    pub remote_id: Option<String>,
    pub remote_path: Option<String>,
    pub error: Option<String>,
    pub error_class: Option<String>,
}

impl TransferRecord {
    pub fn new(
        file_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        total_bytes: u64,
        fingerprint: impl Into<String>,
        strategy: UploadStrategy,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            source_path: source_path.into(),
            total_bytes,
            fingerprint: fingerprint.into(),
            strategy,
            status: TransferStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
            bytes_transferred: 0,
            remote_id: None,
            remote_path: None,
            error: None,
            error_class: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TransferStatus::InProgress;
        self.started_at = Utc::now();
    }

    pub fn mark_completed(&mut self, remote_id: String, remote_path: Option<String>) {
        self.status = TransferStatus::Completed;
        self.bytes_transferred = self.total_bytes;
        self.remote_id = Some(remote_id);
        self.remote_path = remote_path;
        self.finish();
    }

    pub fn mark_failed(&mut self, error: &SyncError, bytes_transferred: u64) {
        self.status = TransferStatus::Failed;
        self.bytes_transferred = bytes_transferred;
        self.error = Some(error.to_string());
        self.error_class = Some(error.class().to_string());
        self.finish();
    }

    /// Record that this session was skipped because `prior` already uploaded
    /// the same content.
    pub fn mark_skipped(&mut self, prior: &TransferRecord) {
        self.status = TransferStatus::Skipped;
        self.remote_id = prior.remote_id.clone();
        self.remote_path = prior.remote_path.clone();
        self.finish();
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.duration_secs = Some(
            (now - self.started_at)
                .to_std()
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        );
        self.finished_at = Some(now);
    }
}

/// Journal of transfer records backed by a directory of JSON files.
pub struct Journal {
    dir: PathBuf,
    records: RwLock<HashMap<String, TransferRecord>>,
}

impl Journal {
    /// Open (creating if needed) the journal at `dir` and load its records.
    /// Unparseable files are skipped with a warning, not fatal.
    pub fn open(dir: impl Into<PathBuf>) -> SyncResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut records = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_record(&path) {
                Ok(record) => {
                    records.insert(record.id.clone(), record);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable journal record");
                }
            }
        }
        debug!(count = records.len(), dir = %dir.display(), "journal loaded");

        Ok(Self {
            dir,
            records: RwLock::new(records),
        })
    }

    /// Platform default journal location.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudsync")
            .join("journal")
    }

    /// Insert or update a record and persist it to disk.
    pub fn save(&self, record: &TransferRecord) -> SyncResult<()> {
        let path = self.dir.join(format!("{}.json", record.id));
        let tmp = self.dir.join(format!("{}.json.tmp", record.id));

        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    /// The completed record matching `fingerprint`, if any.
    pub fn find_completed(&self, fingerprint: &str) -> Option<TransferRecord> {
        self.records
            .read()
            .values()
            .find(|r| r.status == TransferStatus::Completed && r.fingerprint == fingerprint)
            .cloned()
    }

    /// Fingerprints of every completed transfer.
    pub fn completed_fingerprints(&self) -> std::collections::HashSet<String> {
        self.records
            .read()
            .values()
            .filter(|r| r.status == TransferStatus::Completed)
            .map(|r| r.fingerprint.clone())
            .collect()
    }

    /// The `n` most recently started records, newest first.
    pub fn recent(&self, n: usize) -> Vec<TransferRecord> {
        let mut all: Vec<TransferRecord> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all.truncate(n);
        all
    }

    /// Delete every record, on disk and in memory. Returns the count removed.
    pub fn clear(&self) -> SyncResult<usize> {
        let mut records = self.records.write();
        let count = records.len();
        for id in records.keys() {
            let path = self.dir.join(format!("{}.json", id));
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove journal record");
            }
        }
        records.clear();
        Ok(count)
    }
}

fn load_record(path: &Path) -> SyncResult<TransferRecord> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(fingerprint: &str) -> TransferRecord {
        TransferRecord::new("db.bak", "/tmp/db.bak", 1000, fingerprint, UploadStrategy::Parallel)
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let mut r = record("abc123");
        r.mark_completed("remote-1".into(), Some("/backups/db.bak".into()));

        {
            let journal = Journal::open(dir.path()).unwrap();
            journal.save(&r).unwrap();
        }

        let journal = Journal::open(dir.path()).unwrap();
        let found = journal.find_completed("abc123").unwrap();
        assert_eq!(found.id, r.id);
        assert_eq!(found.remote_id.as_deref(), Some("remote-1"));
        assert_eq!(found.bytes_transferred, 1000);
    }

    #[test]
    fn only_completed_records_satisfy_dedupe() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();

        let mut failed = record("abc123");
        failed.mark_failed(&SyncError::Timeout("t".into()), 100);
        journal.save(&failed).unwrap();

        assert!(journal.find_completed("abc123").is_none());
        assert_eq!(failed.error_class.as_deref(), Some("network"));
        assert_eq!(failed.bytes_transferred, 100);
    }

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        for i in 0..5 {
            let mut r = record(&format!("fp{}", i));
            r.started_at = Utc::now() + chrono::Duration::seconds(i);
            journal.save(&r).unwrap();
        }

        let recent = journal.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].fingerprint, "fp4");
        assert_eq!(recent[2].fingerprint, "fp2");
    }

    #[test]
    fn clear_removes_disk_and_memory() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.save(&record("a")).unwrap();
        journal.save(&record("b")).unwrap();

        assert_eq!(journal.clear().unwrap(), 2);
        assert!(journal.recent(10).is_empty());
        let journal = Journal::open(dir.path()).unwrap();
        assert!(journal.recent(10).is_empty());
    }

    #[test]
    fn skipped_record_carries_prior_remote_ref() {
        let mut prior = record("same");
        prior.mark_completed("remote-9".into(), None);

        let mut skipped = record("same");
        skipped.mark_skipped(&prior);
        assert_eq!(skipped.status, TransferStatus::Skipped);
        assert_eq!(skipped.remote_id.as_deref(), Some("remote-9"));
    }
}
