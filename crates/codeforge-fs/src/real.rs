//! `std`/`tokio`-backed [`Filesystem`] implementation, with `notify` for
//! watching and `ignore`/`globset` for the indexer's built-in exclusions.

use crate::traits::{FileChangeEvent, Filesystem, FsError, FsResult, Stat, WatchOptions};
use codeforge_core::WorkspaceUri;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use tokio::sync::mpsc::UnboundedReceiver;

/// The directory names the Indexer's walker always skips, regardless of
/// `indexer.excludeGlobs` (spec §4.5: "VCS metadata, dependency caches,
/// build outputs, tool caches").
pub const BUILTIN_EXCLUDES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "dist",
    "build",
    ".cache",
    "__pycache__",
    ".venv",
    "vendor",
];

/// A [`Filesystem`] backed by real disk I/O under a fixed workspace root.
pub struct RealFilesystem {
    root: PathBuf,
}

impl RealFilesystem {
    /// Construct a filesystem rooted at `root`. `root` must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, uri: &WorkspaceUri) -> PathBuf {
        uri.to_path(&self.root)
    }

    /// Start watching the workspace for filesystem changes. Returns a
    /// receiver of coalesced [`FileChangeEvent`] batches; the watcher
    /// itself is kept alive for as long as the receiver is held by
    /// leaking it into a background task owned by the returned guard.
    pub fn watch(&self, options: WatchOptions) -> FsResult<WatchHandle> {
        let (raw_tx, raw_rx) = channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| FsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.root, mode)
            .map_err(|e| FsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

        let excludes = build_exclusion_matcher(&options.excludes);
        let root = self.root.clone();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        std::thread::spawn(move || {
            while let Ok(res) = raw_rx.recv() {
                let Ok(event) = res else { continue };
                if let Some(change) = translate_event(&root, &excludes, event) {
                    if tx.send(change).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(WatchHandle {
            _watcher: watcher,
            receiver: rx,
        })
    }
}

/// Owns the live `notify` watcher and the channel of translated events.
/// Dropping this stops the watch.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    receiver: UnboundedReceiver<FileChangeEvent>,
}

impl WatchHandle {
    /// Receive the next coalesced change batch.
    pub async fn recv(&mut self) -> Option<FileChangeEvent> {
        self.receiver.recv().await
    }
}

fn build_exclusion_matcher(extra: &[String]) -> globset::GlobSet {
    let mut builder = globset::GlobSetBuilder::new();
    for dir in BUILTIN_EXCLUDES {
        if let Ok(glob) = globset::Glob::new(&format!("**/{dir}/**")) {
            builder.add(glob);
        }
    }
    for pattern in extra {
        if let Ok(glob) = globset::Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| globset::GlobSet::empty())
}

fn translate_event(
    root: &Path,
    excludes: &globset::GlobSet,
    event: Event,
) -> Option<FileChangeEvent> {
    let mut out = FileChangeEvent::default();
    for path in event.paths {
        if excludes.is_match(&path) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let Some(uri) = to_workspace_uri(root, relative) else {
            continue;
        };
        match event.kind {
            EventKind::Create(_) => out.added.push(uri),
            EventKind::Modify(_) => out.updated.push(uri),
            EventKind::Remove(_) => out.deleted.push(uri),
            _ => {}
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn to_workspace_uri(root: &Path, relative: &Path) -> Option<WorkspaceUri> {
    let raw = relative.to_str()?;
    WorkspaceUri::resolve(root, raw).ok()
}

#[async_trait::async_trait]
impl Filesystem for RealFilesystem {
    async fn read_file(&self, uri: &WorkspaceUri) -> FsResult<String> {
        let path = self.resolve(uri);
        tokio::fs::read_to_string(path).await.map_err(FsError::Io)
    }

    async fn write_file(&self, uri: &WorkspaceUri, content: &str) -> FsResult<()> {
        let path = self.resolve(uri);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(FsError::Io)?;
        }
        tokio::fs::write(path, content).await.map_err(FsError::Io)
    }

    async fn exists(&self, uri: &WorkspaceUri) -> bool {
        tokio::fs::metadata(self.resolve(uri)).await.is_ok()
    }

    async fn stat(&self, uri: &WorkspaceUri) -> FsResult<Stat> {
        let meta = tokio::fs::metadata(self.resolve(uri))
            .await
            .map_err(FsError::Io)?;
        Ok(Stat {
            is_dir: meta.is_dir(),
            size: meta.len(),
        })
    }

    async fn delete(&self, uri: &WorkspaceUri, recursive: bool) -> FsResult<()> {
        let path = self.resolve(uri);
        let meta = tokio::fs::metadata(&path).await.map_err(FsError::Io)?;
        if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(path).await.map_err(FsError::Io)
            } else {
                tokio::fs::remove_dir(path).await.map_err(FsError::Io)
            }
        } else {
            tokio::fs::remove_file(path).await.map_err(FsError::Io)
        }
    }

    async fn create_file(&self, uri: &WorkspaceUri) -> FsResult<()> {
        let path = self.resolve(uri);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(FsError::Io)?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .await
            .map_err(FsError::Io)?;
        drop(file);
        Ok(())
    }

    async fn create_folder(&self, uri: &WorkspaceUri) -> FsResult<()> {
        tokio::fs::create_dir_all(self.resolve(uri))
            .await
            .map_err(FsError::Io)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFilesystem::new(dir.path());
        let uri = WorkspaceUri::resolve(dir.path(), "a/b.txt").unwrap();
        fs.write_file(&uri, "hello").await.unwrap();
        assert_eq!(fs.read_file(&uri).await.unwrap(), "hello");
        assert!(fs.exists(&uri).await);
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFilesystem::new(dir.path());
        let uri = WorkspaceUri::resolve(dir.path(), "a.txt").unwrap();
        fs.write_file(&uri, "x").await.unwrap();
        fs.delete(&uri, false).await.unwrap();
        assert!(!fs.exists(&uri).await);
    }

    #[tokio::test]
    async fn create_file_fails_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFilesystem::new(dir.path());
        let uri = WorkspaceUri::resolve(dir.path(), "a.txt").unwrap();
        fs.create_file(&uri).await.unwrap();
        assert!(fs.create_file(&uri).await.is_err());
    }

    #[test]
    fn builtin_excludes_match_git_and_node_modules() {
        let matcher = build_exclusion_matcher(&[]);
        assert!(matcher.is_match(Path::new("repo/.git/HEAD")));
        assert!(matcher.is_match(Path::new("repo/node_modules/pkg/index.js")));
        assert!(!matcher.is_match(Path::new("repo/src/lib.rs")));
    }
}
