//! VCS auto-stash: a last-resort rollback path for when snapshotting is
//! skipped or its restore fails.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;

/// When to create a stash before an apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StashMode {
    /// Never stash.
    Off,
    /// Stash only if the working tree already has uncommitted changes.
    DirtyOnly,
    /// Always stash before apply, regardless of tree cleanliness.
    Always,
}

/// An opaque handle to a created stash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashRef(pub String);

/// Errors from the underlying VCS.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The VCS command exited with a failure status.
    #[error("vcs command failed: {0}")]
    CommandFailed(String),
    /// Spawning the VCS process failed.
    #[error("failed to run vcs command: {0}")]
    Io(#[from] std::io::Error),
}

/// The VCS operations the durability layer consumes. Implemented by a real
/// `git` CLI backend and an in-memory double for tests.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Whether the working tree currently has uncommitted changes.
    async fn is_working_tree_dirty(&self) -> Result<bool, VcsError>;

    /// Create a stash tagged with `operation_id`, honoring `mode`. Returns
    /// `None` when `mode` decides no stash is needed.
    async fn create_stash(
        &self,
        operation_id: &str,
        mode: StashMode,
    ) -> Result<Option<StashRef>, VcsError> {
        if mode == StashMode::Off {
            return Ok(None);
        }
        if mode == StashMode::DirtyOnly && !self.is_working_tree_dirty().await? {
            return Ok(None);
        }
        self.stash(operation_id).await.map(Some)
    }

    /// Unconditionally create a stash.
    async fn stash(&self, operation_id: &str) -> Result<StashRef, VcsError>;

    /// Pop (apply and drop) a previously created stash.
    async fn restore_stash(&self, stash: &StashRef) -> Result<(), VcsError>;

    /// Drop a stash without applying it.
    async fn drop_stash(&self, stash: &StashRef) -> Result<(), VcsError>;
}

/// A [`VcsBackend`] that shells out to the `git` CLI.
pub struct GitCliBackend {
    repo_root: PathBuf,
}

impl GitCliBackend {
    /// Construct a backend operating against the git repository rooted at
    /// `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VcsBackend for GitCliBackend {
    async fn is_working_tree_dirty(&self) -> Result<bool, VcsError> {
        let status = self.run(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn stash(&self, operation_id: &str) -> Result<StashRef, VcsError> {
        let message = format!("codeforge-apply:{operation_id}");
        self.run(&["stash", "push", "--include-untracked", "-m", &message])
            .await?;
        let list = self.run(&["stash", "list"]).await?;
        let top = list
            .lines()
            .next()
            .and_then(|line| line.split(':').next())
            .unwrap_or("stash@{0}")
            .to_string();
        Ok(StashRef(top))
    }

    async fn restore_stash(&self, stash: &StashRef) -> Result<(), VcsError> {
        self.run(&["stash", "pop", &stash.0]).await?;
        Ok(())
    }

    async fn drop_stash(&self, stash: &StashRef) -> Result<(), VcsError> {
        self.run(&["stash", "drop", &stash.0]).await?;
        Ok(())
    }
}

/// An in-memory [`VcsBackend`] for tests, with an adjustable dirty flag and
/// a fake stash list.
#[derive(Default)]
pub struct InMemoryVcsBackend {
    dirty: std::sync::atomic::AtomicBool,
    next_id: std::sync::atomic::AtomicU64,
    stashes: parking_lot::Mutex<std::collections::HashMap<String, ()>>,
}

impl InMemoryVcsBackend {
    /// Construct a clean (non-dirty) backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the simulated working tree as dirty or clean.
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of stashes currently held (not yet popped or dropped).
    pub fn live_stash_count(&self) -> usize {
        self.stashes.lock().len()
    }
}

#[async_trait]
impl VcsBackend for InMemoryVcsBackend {
    async fn is_working_tree_dirty(&self) -> Result<bool, VcsError> {
        Ok(self.dirty.load(std::sync::atomic::Ordering::SeqCst))
    }

    async fn stash(&self, operation_id: &str) -> Result<StashRef, VcsError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let handle = format!("stash@{{{id}}}:{operation_id}");
        self.stashes.lock().insert(handle.clone(), ());
        Ok(StashRef(handle))
    }

    async fn restore_stash(&self, stash: &StashRef) -> Result<(), VcsError> {
        self.stashes
            .lock()
            .remove(&stash.0)
            .ok_or_else(|| VcsError::CommandFailed(format!("no such stash: {}", stash.0)))?;
        Ok(())
    }

    async fn drop_stash(&self, stash: &StashRef) -> Result<(), VcsError> {
        self.stashes
            .lock()
            .remove(&stash.0)
            .ok_or_else(|| VcsError::CommandFailed(format!("no such stash: {}", stash.0)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn off_mode_never_stashes() {
        let backend = InMemoryVcsBackend::new();
        backend.set_dirty(true);
        let stash = backend.create_stash("op1", StashMode::Off).await.unwrap();
        assert!(stash.is_none());
    }

    #[tokio::test]
    async fn dirty_only_skips_on_clean_tree() {
        let backend = InMemoryVcsBackend::new();
        let stash = backend
            .create_stash("op1", StashMode::DirtyOnly)
            .await
            .unwrap();
        assert!(stash.is_none());
    }

    #[tokio::test]
    async fn dirty_only_stashes_when_dirty() {
        let backend = InMemoryVcsBackend::new();
        backend.set_dirty(true);
        let stash = backend
            .create_stash("op1", StashMode::DirtyOnly)
            .await
            .unwrap();
        assert!(stash.is_some());
        assert_eq!(backend.live_stash_count(), 1);
    }

    #[tokio::test]
    async fn always_stashes_on_clean_tree() {
        let backend = InMemoryVcsBackend::new();
        let stash = backend
            .create_stash("op1", StashMode::Always)
            .await
            .unwrap();
        assert!(stash.is_some());
    }

    #[tokio::test]
    async fn restore_then_restore_again_fails() {
        let backend = InMemoryVcsBackend::new();
        let stash = backend.stash("op1").await.unwrap();
        backend.restore_stash(&stash).await.unwrap();
        assert!(backend.restore_stash(&stash).await.is_err());
    }
}
