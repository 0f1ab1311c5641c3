//! In-memory [`Filesystem`]/[`EditorBufferSource`] test doubles with
//! injectable failures, used by the apply-engine and indexer test suites
//! to express the spec's injected-failure scenarios without touching
//! real disk.

use crate::traits::{BufferHandle, EditorBufferSource, Filesystem, FsError, FsResult, Stat};
use async_trait::async_trait;
use codeforge_core::{TextEdit, WorkspaceUri};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// An in-memory filesystem keyed by [`WorkspaceUri`], for deterministic
/// tests of the Apply Engine and Indexer.
#[derive(Default)]
pub struct InMemoryFilesystem {
    root: PathBuf,
    files: DashMap<String, String>,
    dirs: DashMap<String, ()>,
    fail_next_write: DashMap<String, String>,
}

impl InMemoryFilesystem {
    /// Construct an empty in-memory filesystem rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Seed a file's content directly, bypassing `write_file`.
    pub fn seed(&self, uri: &WorkspaceUri, content: impl Into<String>) {
        self.files.insert(uri.as_str().to_string(), content.into());
    }

    /// Arrange for the *next* `write_file` call targeting `uri` to fail
    /// with `reason`, then succeed on subsequent attempts. Used to
    /// exercise the atomicity/rollback scenarios in spec §8.
    pub fn fail_next_write(&self, uri: &WorkspaceUri, reason: impl Into<String>) {
        self.fail_next_write
            .insert(uri.as_str().to_string(), reason.into());
    }

    /// Read a file's raw content directly, for test assertions.
    pub fn peek(&self, uri: &WorkspaceUri) -> Option<String> {
        self.files.get(uri.as_str()).map(|v| v.clone())
    }
}

#[async_trait]
impl Filesystem for InMemoryFilesystem {
    async fn read_file(&self, uri: &WorkspaceUri) -> FsResult<String> {
        self.files
            .get(uri.as_str())
            .map(|v| v.clone())
            .ok_or_else(|| FsError::NotFound(uri.as_str().to_string()))
    }

    async fn write_file(&self, uri: &WorkspaceUri, content: &str) -> FsResult<()> {
        if let Some((_, reason)) = self.fail_next_write.remove(uri.as_str()) {
            return Err(FsError::Injected(reason));
        }
        self.files.insert(uri.as_str().to_string(), content.to_string());
        Ok(())
    }

    async fn exists(&self, uri: &WorkspaceUri) -> bool {
        self.files.contains_key(uri.as_str()) || self.dirs.contains_key(uri.as_str())
    }

    async fn stat(&self, uri: &WorkspaceUri) -> FsResult<Stat> {
        if let Some(v) = self.files.get(uri.as_str()) {
            return Ok(Stat {
                is_dir: false,
                size: v.len() as u64,
            });
        }
        if self.dirs.contains_key(uri.as_str()) {
            return Ok(Stat {
                is_dir: true,
                size: 0,
            });
        }
        Err(FsError::NotFound(uri.as_str().to_string()))
    }

    async fn delete(&self, uri: &WorkspaceUri, recursive: bool) -> FsResult<()> {
        if self.files.remove(uri.as_str()).is_some() {
            return Ok(());
        }
        if self.dirs.remove(uri.as_str()).is_some() {
            if recursive {
                let prefix = format!("{}/", uri.as_str());
                self.files.retain(|k, _| !k.starts_with(&prefix));
            }
            return Ok(());
        }
        Err(FsError::NotFound(uri.as_str().to_string()))
    }

    async fn create_file(&self, uri: &WorkspaceUri) -> FsResult<()> {
        if self.files.contains_key(uri.as_str()) {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "file exists",
            )));
        }
        self.files.insert(uri.as_str().to_string(), String::new());
        Ok(())
    }

    async fn create_folder(&self, uri: &WorkspaceUri) -> FsResult<()> {
        self.dirs.insert(uri.as_str().to_string(), ());
        Ok(())
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Apply non-overlapping text edits to `content` by splicing from the
/// last edit to the first, so earlier offsets stay valid as later
/// (in document order) edits are applied. Mirrors the ordering the
/// apply engine's expected-result computation relies on.
fn splice_descending(content: &str, edits: &[TextEdit]) -> String {
    let mut lines: Vec<String> = content.split('\n').map(|l| l.to_string()).collect();
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.start().cmp(&a.start()));

    for edit in ordered {
        let start_line = edit.start_line.saturating_sub(1) as usize;
        let end_line = edit.end_line.saturating_sub(1) as usize;
        if start_line >= lines.len() || end_line >= lines.len() {
            continue;
        }
        let start_col = (edit.start_col.saturating_sub(1) as usize).min(lines[start_line].len());
        let end_col = (edit.end_col.saturating_sub(1) as usize).min(lines[end_line].len());

        let prefix = lines[start_line][..start_col].to_string();
        let suffix = lines[end_line][end_col..].to_string();
        let replacement = format!("{prefix}{}{suffix}", edit.new_text);

        lines.splice(start_line..=end_line, replacement.split('\n').map(|l| l.to_string()));
    }

    lines.join("\n")
}

/// An in-memory editor buffer, mutable through [`BufferHandle`].
struct InMemoryBuffer {
    content: Mutex<String>,
    disposed: AtomicBool,
}

#[async_trait]
impl BufferHandle for InMemoryBuffer {
    async fn get_value_lf(&self) -> String {
        codeforge_core::normalize_line_endings(&self.content.lock().unwrap())
    }

    async fn set_value(&self, content: &str) {
        *self.content.lock().unwrap() = content.to_string();
    }

    async fn apply_edits(&self, edits: &[TextEdit]) {
        let mut guard = self.content.lock().unwrap();
        let applied = splice_descending(&guard, edits);
        *guard = applied;
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// An in-memory registry of open editor buffers.
#[derive(Default)]
pub struct InMemoryBufferSource {
    buffers: DashMap<String, Arc<InMemoryBuffer>>,
}

impl InMemoryBufferSource {
    /// Construct an empty buffer source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a dirty buffer for `uri` with the given content.
    pub fn open(&self, uri: &WorkspaceUri, content: impl Into<String>) {
        self.buffers.insert(
            uri.as_str().to_string(),
            Arc::new(InMemoryBuffer {
                content: Mutex::new(content.into()),
                disposed: AtomicBool::new(false),
            }),
        );
    }

    /// Mark a buffer as disposed, so it is no longer consulted for base
    /// capture.
    pub fn dispose(&self, uri: &WorkspaceUri) {
        if let Some(buf) = self.buffers.get(uri.as_str()) {
            buf.disposed.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl EditorBufferSource for InMemoryBufferSource {
    async fn resolve_model(&self, uri: &WorkspaceUri) -> Option<Arc<dyn BufferHandle>> {
        self.buffers
            .get(uri.as_str())
            .map(|v| v.clone() as Arc<dyn BufferHandle>)
    }
}
