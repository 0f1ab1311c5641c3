//! Filesystem and editor-buffer abstractions (spec §6, "External
//! Interfaces (consumed)").

use async_trait::async_trait;
use codeforge_core::WorkspaceUri;
use thiserror::Error;

/// Errors surfaced by a [`Filesystem`] implementation.
#[derive(Debug, Error)]
pub enum FsError {
    /// The target does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The underlying I/O call failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A test double was configured to fail this call.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Result type for filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Metadata about a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

/// Options controlling a recursive filesystem watch.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Watch subdirectories as well as `root` itself.
    pub recursive: bool,
    /// Additional glob exclusions, layered on top of the built-in ones.
    pub excludes: Vec<String>,
}

/// One batch of filesystem changes, as delivered by `onDidFilesChange`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChangeEvent {
    /// URIs that were created.
    pub added: Vec<WorkspaceUri>,
    /// URIs whose content changed.
    pub updated: Vec<WorkspaceUri>,
    /// URIs that were removed.
    pub deleted: Vec<WorkspaceUri>,
}

impl FileChangeEvent {
    /// True if this batch carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// The disk-facing filesystem abstraction both subsystems consume.
///
/// Every method is async: reads, writes, deletes and watch setup are all
/// suspension points per the spec's concurrency model (§5) — none of
/// them may block the single cooperative scheduler.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Read the full content of a file as UTF-8. Non-UTF-8 files are
    /// reported as `FsError::Io` wrapping an `InvalidData` error.
    async fn read_file(&self, uri: &WorkspaceUri) -> FsResult<String>;

    /// Overwrite (or create) a file with `content`.
    async fn write_file(&self, uri: &WorkspaceUri, content: &str) -> FsResult<()>;

    /// Whether `uri` currently exists.
    async fn exists(&self, uri: &WorkspaceUri) -> bool;

    /// Metadata for an existing entry.
    async fn stat(&self, uri: &WorkspaceUri) -> FsResult<Stat>;

    /// Remove a file, or a folder when `recursive` is set.
    async fn delete(&self, uri: &WorkspaceUri, recursive: bool) -> FsResult<()>;

    /// Create an empty file. Fails if `uri` already exists.
    async fn create_file(&self, uri: &WorkspaceUri) -> FsResult<()>;

    /// Create a folder (and any missing parents).
    async fn create_folder(&self, uri: &WorkspaceUri) -> FsResult<()>;

    /// The filesystem root this instance resolves relative URIs against.
    fn root(&self) -> &std::path::Path;
}

/// A reference handle to an open editor text buffer.
///
/// The handle releases its registration when dropped, per the spec's
/// "lifetime managed by a reference handle that releases on drop."
#[async_trait]
pub trait BufferHandle: Send + Sync {
    /// The buffer's current content, with line endings normalized to LF.
    async fn get_value_lf(&self) -> String;

    /// Replace the buffer's entire content.
    async fn set_value(&self, content: &str);

    /// Apply a set of text edits to the buffer in place.
    async fn apply_edits(&self, edits: &[codeforge_core::TextEdit]);

    /// Whether the underlying model has been disposed (e.g. the editor
    /// tab was closed) and should no longer be used.
    fn is_disposed(&self) -> bool;
}

/// Resolves a [`WorkspaceUri`] to an open editor buffer, if one exists.
#[async_trait]
pub trait EditorBufferSource: Send + Sync {
    /// Look up a live, non-disposed buffer for `uri`.
    async fn resolve_model(&self, uri: &WorkspaceUri) -> Option<std::sync::Arc<dyn BufferHandle>>;
}

/// Resolve the one piece of information every base-capture step needs:
/// content plus whether it came from a dirty buffer, with buffer content
/// taking priority over disk (spec Design Notes, "editor buffer vs disk
/// dualism").
pub async fn capture_source(
    fs: &dyn Filesystem,
    buffers: &dyn EditorBufferSource,
    uri: &WorkspaceUri,
) -> FsResult<(String, bool)> {
    if let Some(handle) = buffers.resolve_model(uri).await {
        if !handle.is_disposed() {
            return Ok((handle.get_value_lf().await, true));
        }
    }
    let content = fs.read_file(uri).await?;
    Ok((content, false))
}
