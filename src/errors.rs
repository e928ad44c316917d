//! Error types for the cloud sync engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sync operations.
///
/// Variants are grouped by the layer that produced them: local filesystem,
/// network transport, remote server, or wire protocol. [`SyncError::class`]
/// returns the group name so the journal can record it alongside the message.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("transmission interrupted: {0}")]
    TransmissionInterrupted(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{failed} of {total} chunks failed: {}", .errors.join("; "))]
    ChunksFailed {
        failed: usize,
        total: usize,
        errors: Vec<String>,
    },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upload cancelled")]
    Cancelled,

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Classify a failed access to a source file. Only a missing file maps to
    /// [`SyncError::SourceNotFound`]; permission and lock errors keep their
    /// IO detail.
    pub(crate) fn from_source_io(path: &std::path::Path, err: std::io::Error) -> SyncError {
        if err.kind() == std::io::ErrorKind::NotFound {
            SyncError::SourceNotFound(path.to_path_buf())
        } else {
            SyncError::Io(err)
        }
    }

    /// Coarse classification of the error, recorded in the journal for
    /// operator diagnosis.
    pub fn class(&self) -> &'static str {
        match self {
            SyncError::Io(_) | SyncError::SourceNotFound(_) => "local",
            SyncError::ConnectionFailed(_)
            | SyncError::Timeout(_)
            | SyncError::Tls(_)
            | SyncError::TransmissionInterrupted(_) => "network",
            SyncError::Auth(_) | SyncError::Server { .. } => "server",
            SyncError::Protocol(_) | SyncError::ChunksFailed { .. } | SyncError::Json(_) => {
                "protocol"
            }
            SyncError::Cancelled => "cancelled",
            SyncError::InvalidUrl(_) | SyncError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_covers_taxonomy() {
        assert_eq!(SyncError::SourceNotFound(PathBuf::from("/x")).class(), "local");
        assert_eq!(SyncError::Timeout("t".into()).class(), "network");
        assert_eq!(
            SyncError::Server { status: 500, message: "boom".into() }.class(),
            "server"
        );
        assert_eq!(SyncError::Protocol("missing id".into()).class(), "protocol");
    }

    #[test]
    fn source_io_keeps_non_missing_errors_distinct() {
        use std::io::{Error, ErrorKind};
        let path = std::path::Path::new("/backups/db.bak");

        let missing = SyncError::from_source_io(path, Error::from(ErrorKind::NotFound));
        assert!(matches!(missing, SyncError::SourceNotFound(_)));

        let denied = SyncError::from_source_io(path, Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(denied, SyncError::Io(_)));
        assert_eq!(denied.class(), "local");
    }

    #[test]
    fn chunks_failed_summarizes_first_errors() {
        let err = SyncError::ChunksFailed {
            failed: 2,
            total: 24,
            errors: vec!["chunk 3: HTTP 500".into(), "chunk 9: timeout".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 of 24"));
        assert!(text.contains("chunk 3"));
        assert!(text.contains("chunk 9"));
    }
}
