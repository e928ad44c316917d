//! Upload progress reporting.
//!
//! Events flow through a bounded mpsc channel. Senders use `try_send` and drop
//! the event when the channel is full, so a slow consumer can never stall a
//! transfer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle stage of an upload, in order of occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Preparing,
    Hashing,
    Uploading,
    Assembling,
    Completed,
    Failed,
}

/// One progress event for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadProgress {
    pub file_name: String,
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub stage: UploadStage,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_sent as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Handle the uploaders use to emit events. Cloneable; a `None` channel makes
/// every send a no-op so callers who don't care pay nothing.
#[derive(Clone)]
pub struct ProgressSender {
    file_name: String,
    total_bytes: u64,
    tx: Option<mpsc::Sender<UploadProgress>>,
}

impl ProgressSender {
    pub fn new(
        file_name: impl Into<String>,
        total_bytes: u64,
        tx: Option<mpsc::Sender<UploadProgress>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            total_bytes,
            tx,
        }
    }

    /// Emit an event. Dropped silently if the channel is full or closed.
    pub fn send(&self, stage: UploadStage, bytes_sent: u64) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(UploadProgress {
                file_name: self.file_name.clone(),
                bytes_sent,
                total_bytes: self.total_bytes,
                stage,
            });
        }
    }
}

/// Convenience constructor for a bounded progress channel.
pub fn channel() -> (mpsc::Sender<UploadProgress>, mpsc::Receiver<UploadProgress>) {
    mpsc::channel(PROGRESS_CHANNEL_CAPACITY)
}
