//! Sync-state reconciliation against the remote catalog.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::SyncResult;
use crate::protocol::RemoteObjectInfo;
use crate::remote::RemoteClient;

/// Relationship between a local file and the remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No remote file shares this name.
    NotSynced,
    /// A remote file has the same name and size.
    Synced,
    /// A remote file has the same name but a different size.
    NeedsUpdate,
    /// The catalog could not be consulted.
    Unknown,
}

/// Per-file reconciliation verdict.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub local_path: PathBuf,
    pub file_name: String,
    pub local_size: u64,
    pub local_modified: Option<DateTime<Utc>>,
    pub state: SyncState,
    pub remote: Option<RemoteObjectInfo>,
}

fn classify(local_size: u64, remote: Option<&RemoteObjectInfo>) -> SyncState {
    match remote {
        None => SyncState::NotSynced,
        Some(r) if r.size == local_size => SyncState::Synced,
        Some(_) => SyncState::NeedsUpdate,
    }
}

/// Classify each local path against one snapshot of the remote catalog.
///
/// Matching is by lowercased file name, so one catalog fetch serves any
/// number of local files. An unreachable catalog degrades every verdict to
/// `Unknown` rather than failing the whole call.
pub async fn reconcile(client: &RemoteClient, paths: &[PathBuf]) -> SyncResult<Vec<SyncStatus>> {
    let remote_index: Option<HashMap<String, RemoteObjectInfo>> = match client.list(None).await {
        Ok(files) => Some(
            files
                .into_iter()
                .map(|f| (f.name.to_lowercase(), f))
                .collect(),
        ),
        Err(e) => {
            warn!(error = %e, "remote catalog unreachable, sync states unknown");
            None
        }
    };

    let mut statuses = Vec::with_capacity(paths.len());
    for path in paths {
        statuses.push(status_for(path, remote_index.as_ref()));
    }
    Ok(statuses)
}

fn status_for(path: &Path, remote_index: Option<&HashMap<String, RemoteObjectInfo>>) -> SyncStatus {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (local_size, local_modified) = match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta.modified().ok().map(DateTime::<Utc>::from);
            (meta.len(), modified)
        }
        Err(_) => (0, None),
    };

    let (state, remote) = match remote_index {
        None => (SyncState::Unknown, None),
        Some(index) => {
            let remote = index.get(&file_name.to_lowercase()).cloned();
            (classify(local_size, remote.as_ref()), remote)
        }
    };

    SyncStatus {
        local_path: path.to_path_buf(),
        file_name,
        local_size,
        local_modified,
        state,
        remote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, size: u64) -> RemoteObjectInfo {
        RemoteObjectInfo {
            id: "r1".into(),
            name: name.into(),
            size,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn same_name_and_size_is_synced() {
        let r = remote("db.bak", 1000);
        assert_eq!(classify(1000, Some(&r)), SyncState::Synced);
    }

    #[test]
    fn same_name_different_size_needs_update() {
        let r = remote("db.bak", 1000);
        assert_eq!(classify(1200, Some(&r)), SyncState::NeedsUpdate);
    }

    #[test]
    fn absent_remote_is_not_synced() {
        assert_eq!(classify(1000, None), SyncState::NotSynced);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let index: HashMap<String, RemoteObjectInfo> =
            [("db.bak".to_string(), remote("DB.bak", 5))].into();
        let status = status_for(Path::new("/tmp/does-not-exist/DB.BAK"), Some(&index));
        // size 0 locally vs 5 remote
        assert_eq!(status.state, SyncState::NeedsUpdate);
        assert!(status.remote.is_some());
    }

    #[test]
    fn unreachable_catalog_degrades_to_unknown() {
        let status = status_for(Path::new("/tmp/does-not-exist/a.bak"), None);
        assert_eq!(status.state, SyncState::Unknown);
        assert!(status.remote.is_none());
    }
}
