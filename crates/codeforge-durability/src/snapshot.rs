//! Rollback snapshot store.
//!
//! Captures pre-apply content for every file a transaction touches so the
//! apply engine can restore exactly what the user saw, preferring dirty
//! editor buffers over disk content for the same reason base capture does.

use codeforge_core::WorkspaceUri;
use codeforge_fs::{capture_source, EditorBufferSource, Filesystem};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One file's content as captured before a transaction wrote to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFileEntry {
    /// The file this capture belongs to.
    pub uri: WorkspaceUri,
    /// Content immediately before the apply that triggered this snapshot.
    pub content_before_apply: String,
    /// Whether `content_before_apply` came from a dirty editor buffer.
    pub was_dirty: bool,
}

/// An in-memory capture of pre-apply content for a set of files.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Opaque identifier, handed back to `restore_snapshot`/`discard_snapshot`.
    pub id: Uuid,
    /// Milliseconds since the Unix epoch when this snapshot was created.
    pub created_at_millis: u128,
    /// Per-file captures, in the order the transaction touched them.
    pub files: Vec<SnapshotFileEntry>,
}

/// What `create_snapshot` produced.
#[derive(Debug, Clone)]
pub enum SnapshotOutcome {
    /// A full snapshot was captured.
    Created(Snapshot),
    /// Capture was skipped because the total byte budget would be exceeded.
    /// The apply engine should fall back to the VCS stash, if enabled.
    Skipped,
}

/// Errors raised while creating or restoring a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot id was not found (already discarded, or never created).
    #[error("unknown snapshot id: {0}")]
    NotFound(Uuid),
    /// Reading or writing a file during capture or restore failed.
    #[error("filesystem error during snapshot: {0}")]
    Fs(#[from] codeforge_fs::FsError),
}

/// Owns all live snapshots for a workspace.
///
/// Snapshots are process-local: the spec explicitly does not require them
/// to survive process death, since a crash mid-transaction is expected to
/// leave the filesystem partially written and recoverable only through the
/// audit log's record that the outcome was never committed.
pub struct SnapshotStore {
    max_bytes: u64,
    live: Mutex<HashMap<Uuid, Snapshot>>,
}

impl SnapshotStore {
    /// Construct a store with a total capture budget of `max_bytes`. A
    /// budget of `0` disables snapshotting entirely.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this store will ever produce a real snapshot.
    pub fn is_enabled(&self) -> bool {
        self.max_bytes > 0
    }

    /// Capture the current content of every `uris` entry, preferring dirty
    /// buffers. Returns `Skipped` if disabled or over budget.
    pub async fn create_snapshot(
        &self,
        fs: &dyn Filesystem,
        buffers: &dyn EditorBufferSource,
        uris: &[WorkspaceUri],
    ) -> Result<SnapshotOutcome, SnapshotError> {
        if !self.is_enabled() {
            return Ok(SnapshotOutcome::Skipped);
        }

        let mut files = Vec::with_capacity(uris.len());
        let mut total_bytes: u64 = 0;
        for uri in uris {
            let (content, was_dirty) = match capture_source(fs, buffers, uri).await {
                Ok(v) => v,
                Err(codeforge_fs::FsError::NotFound(_)) => (String::new(), false),
                Err(e) => return Err(e.into()),
            };
            total_bytes += content.len() as u64;
            if total_bytes > self.max_bytes {
                return Ok(SnapshotOutcome::Skipped);
            }
            files.push(SnapshotFileEntry {
                uri: uri.clone(),
                content_before_apply: content,
                was_dirty,
            });
        }

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            created_at_millis: now_millis(),
            files,
        };
        let id = snapshot.id;
        self.live.lock().insert(id, snapshot.clone());
        Ok(SnapshotOutcome::Created(snapshot))
    }

    /// Restore every captured file in `id` to its pre-apply content, then
    /// discard it. Disk is always rewritten; an open editor buffer for the
    /// same URI is also reset to the pre-apply content, mirroring how the
    /// write phase keeps buffer and disk in lockstep on the way in.
    pub async fn restore_snapshot(
        &self,
        id: Uuid,
        fs: &dyn Filesystem,
        buffers: &dyn EditorBufferSource,
    ) -> Result<(), SnapshotError> {
        let snapshot = self
            .live
            .lock()
            .remove(&id)
            .ok_or(SnapshotError::NotFound(id))?;
        for entry in &snapshot.files {
            fs.write_file(&entry.uri, &entry.content_before_apply).await?;
            if let Some(handle) = buffers.resolve_model(&entry.uri).await {
                if !handle.is_disposed() {
                    handle.set_value(&entry.content_before_apply).await;
                }
            }
        }
        Ok(())
    }

    /// Drop a snapshot without restoring it, on successful commit.
    pub fn discard_snapshot(&self, id: Uuid) {
        self.live.lock().remove(&id);
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeforge_fs::{BufferHandle, InMemoryBufferSource, InMemoryFilesystem};
    use std::path::Path;

    fn uri(s: &str) -> WorkspaceUri {
        WorkspaceUri::resolve(Path::new("/ws"), s).unwrap()
    }

    #[tokio::test]
    async fn disabled_store_skips() {
        let store = SnapshotStore::new(0);
        let fs = InMemoryFilesystem::new("/ws");
        let bufs = InMemoryBufferSource::new();
        assert!(!store.is_enabled());
        let outcome = store
            .create_snapshot(&fs, &bufs, &[uri("a.txt")])
            .await
            .unwrap();
        assert!(matches!(outcome, SnapshotOutcome::Skipped));
    }

    #[tokio::test]
    async fn over_budget_skips() {
        let store = SnapshotStore::new(4);
        let fs = InMemoryFilesystem::new("/ws");
        let bufs = InMemoryBufferSource::new();
        let u = uri("a.txt");
        fs.seed(&u, "way more than four bytes");
        let outcome = store.create_snapshot(&fs, &bufs, &[u]).await.unwrap();
        assert!(matches!(outcome, SnapshotOutcome::Skipped));
    }

    #[tokio::test]
    async fn create_then_restore_round_trips() {
        let store = SnapshotStore::new(1024);
        let fs = InMemoryFilesystem::new("/ws");
        let bufs = InMemoryBufferSource::new();
        let u = uri("a.txt");
        fs.seed(&u, "original");

        let outcome = store.create_snapshot(&fs, &bufs, &[u.clone()]).await.unwrap();
        let snapshot = match outcome {
            SnapshotOutcome::Created(s) => s,
            SnapshotOutcome::Skipped => panic!("expected a snapshot"),
        };

        fs.write_file(&u, "mutated").await.unwrap();
        store
            .restore_snapshot(snapshot.id, &fs, &bufs)
            .await
            .unwrap();
        assert_eq!(fs.peek(&u).unwrap(), "original");
    }

    #[tokio::test]
    async fn discard_then_restore_fails() {
        let store = SnapshotStore::new(1024);
        let fs = InMemoryFilesystem::new("/ws");
        let bufs = InMemoryBufferSource::new();
        let u = uri("a.txt");
        fs.seed(&u, "original");
        let outcome = store.create_snapshot(&fs, &bufs, &[u]).await.unwrap();
        let snapshot = match outcome {
            SnapshotOutcome::Created(s) => s,
            SnapshotOutcome::Skipped => panic!("expected a snapshot"),
        };
        store.discard_snapshot(snapshot.id);
        assert!(store
            .restore_snapshot(snapshot.id, &fs, &bufs)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn restore_resets_an_open_buffer_too() {
        let store = SnapshotStore::new(1024);
        let fs = InMemoryFilesystem::new("/ws");
        let bufs = InMemoryBufferSource::new();
        let u = uri("a.txt");
        fs.seed(&u, "original");

        let outcome = store.create_snapshot(&fs, &bufs, &[u.clone()]).await.unwrap();
        let snapshot = match outcome {
            SnapshotOutcome::Created(s) => s,
            SnapshotOutcome::Skipped => panic!("expected a snapshot"),
        };

        fs.write_file(&u, "mutated").await.unwrap();
        bufs.open(&u, "mutated");
        store
            .restore_snapshot(snapshot.id, &fs, &bufs)
            .await
            .unwrap();

        assert_eq!(fs.peek(&u).unwrap(), "original");
        let handle = bufs.resolve_model(&u).await.unwrap();
        assert_eq!(handle.get_value_lf().await, "original");
    }
}
