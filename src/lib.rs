//! # codeforge
//!
//! An atomic multi-file apply engine and a hybrid BM25/vector
//! code-retrieval index for AI-assisted editors.
//!
//! [`Workspace`] is the single entry point. It owns the two resources
//! that outlive any one call — the Indexer Store and the Audit Log —
//! and exposes the five operations a host needs: [`Workspace::apply_transaction`],
//! [`Workspace::query`], [`Workspace::query_with_metrics`],
//! [`Workspace::rebuild_index`], and [`Workspace::warm_index`].
//!
//! # Quick start
//!
//! ```no_run
//! use codeforge::{CodeforgeConfig, Workspace, WorkspaceDeps};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> codeforge::Result<()> {
//!     let workspace = Workspace::open("./my-project", CodeforgeConfig::default(), WorkspaceDeps::default())?;
//!
//!     let hits = workspace.query("parse_config", 10).await;
//!     println!("{} hits", hits.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! Internal crates (`codeforge-core`, `codeforge-fs`, `codeforge-apply`,
//! `codeforge-durability`, `codeforge-search`, `codeforge-history`) are
//! implementation detail; only this crate's surface is stable.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;

pub use codeforge_apply::{ApplyOptions, ApplyOutcome, RawOperation};
pub use codeforge_core::ApplyErrorCategory;
pub use codeforge_durability::StashMode;
pub use codeforge_search::{IndexerState, QueryHit, QueryMetrics, QueryResult, SecretDetectionMode};
pub use config::{ApplyEngineConfig, CodeforgeConfig, IndexerConfig, PrivacyConfig, SecretDetectionConfig};

use codeforge_apply::ApplyEngine;
use codeforge_durability::{AuditError, AuditLog, GitCliBackend, SnapshotError, SnapshotStore, VcsBackend};
use codeforge_fs::{
    EditorBufferSource, FileChangeEvent, Filesystem, InMemoryBufferSource, RealFilesystem,
    WatchOptions,
};
use codeforge_search::{
    BuilderConfig, EmbeddingService, IndexBuilder, IndexStore, MaintenanceConfig, MaintenanceLoop,
    NoopSecretDetector, PrivacyGate, QueryEngine, QueryEngineConfig, RegexSymbolExtractor,
    SecretDetector, StaticPrivacyGate, StoreError, SymbolExtractor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything that can go wrong opening or operating a [`Workspace`].
/// `apply_transaction` and `query` never surface one of these to their
/// caller — per spec §8's propagation policy, apply failures are a
/// structured [`ApplyOutcome`] and query failures degrade to an empty
/// result, not an error. This enum only covers lifecycle operations:
/// opening a workspace, loading/persisting the index, reading config.
#[derive(Debug, thiserror::Error)]
pub enum CodeforgeError {
    /// The on-disk config file exists but failed to parse.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    /// The config file (or `.codeforge/` directory) could not be read.
    #[error("config io error: {0}")]
    ConfigIo(std::io::Error),
    /// Loading or persisting the Indexer Store failed.
    #[error("index store error: {0}")]
    Store(#[from] StoreError),
    /// Opening the Audit Log failed.
    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),
    /// A Snapshot Store operation failed outside the apply path (not
    /// currently reachable, kept for forward-compatibility with
    /// `From<SnapshotError>`).
    #[error("snapshot store error: {0}")]
    Snapshot(#[from] SnapshotError),
    /// Watching the workspace root for filesystem changes failed.
    #[error("filesystem watch error: {0}")]
    Watch(#[from] codeforge_fs::FsError),
}

/// Convenience alias for this crate's fallible returns.
pub type Result<T> = std::result::Result<T, CodeforgeError>;

/// Host-supplied collaborators a [`Workspace`] cannot provide itself —
/// the "External interfaces (consumed)" named in spec §6: the live
/// editor buffer source, the embedding backend, and the secret
/// detector. Each has a conservative default so a headless host (a CLI,
/// a batch job) can open a workspace without wiring anything.
pub struct WorkspaceDeps {
    /// Source of truth for unsaved editor buffers. Defaults to an empty
    /// in-memory source, meaning disk is always authoritative — correct
    /// for a host with no live editor attached.
    pub buffers: Arc<dyn EditorBufferSource>,
    /// Computes embeddings for the hybrid query blend. Defaults to
    /// disabled, so the indexer runs BM25-only until a real service is
    /// supplied.
    pub embeddings: Arc<dyn EmbeddingService>,
    /// Flags and redacts secrets ahead of embedding. Defaults to a
    /// no-op detector; a host that cares about "no secrets embedded"
    /// must supply its own.
    pub secrets: Arc<dyn SecretDetector>,
    /// Extracts symbols, imports, and chunk boundaries during a build.
    /// Defaults to the regex/character-window fallback tier.
    pub extractor: Box<dyn SymbolExtractor>,
    /// The version-control backend for auto-stash. `None` defaults to
    /// the real `git` CLI rooted at the workspace being opened — left
    /// as `Option` rather than eagerly constructed here since the
    /// default needs the workspace root, which isn't known yet.
    pub vcs: Option<Arc<dyn VcsBackend>>,
}

impl Default for WorkspaceDeps {
    fn default() -> Self {
        Self {
            buffers: Arc::new(InMemoryBufferSource::new()),
            embeddings: Arc::new(codeforge_search::DisabledEmbeddingService),
            secrets: Arc::new(NoopSecretDetector),
            extractor: Box::new(RegexSymbolExtractor),
            vcs: None,
        }
    }
}

/// The lifecycle-owning handle to one workspace: the Apply Engine, the
/// Indexer Store, the Query Engine, and the Maintenance Loop, all wired
/// to a shared [`Filesystem`] and [`AuditLog`].
///
/// Construct with [`Workspace::open`]; the background watch/refresh
/// task it spawns is dropped (and so stops) when the `Workspace` is
/// dropped — there is no separate `close`, since nothing here holds a
/// resource that outlives the process beyond the files already synced
/// to disk.
pub struct Workspace {
    root: PathBuf,
    config: CodeforgeConfig,
    fs: Arc<dyn Filesystem>,
    apply: ApplyEngine,
    builder: Arc<IndexBuilder>,
    store: Arc<parking_lot::Mutex<IndexStore>>,
    query_engine: Arc<QueryEngine>,
    maintenance: Arc<MaintenanceLoop>,
}

const INDEX_FILE_NAME: &str = "index.json";
const LEGACY_INDEX_FILE_NAME: &str = ".codeforge-index.json";
const AUDIT_FILE_NAME: &str = "audit.jsonl";
const CONFIG_FILE_NAME: &str = "config.toml";

impl Workspace {
    /// Open a workspace rooted at `root`.
    ///
    /// Reads `<root>/.codeforge/config.toml` if present (missing file is
    /// not an error — it falls back to `config`'s defaults merged with
    /// whatever the file overrides); opens the Audit Log and the
    /// Indexer Store, migrating a legacy in-workspace index location if
    /// found; and spawns the background watch/maintenance task.
    pub fn open(root: impl Into<PathBuf>, config: CodeforgeConfig, deps: WorkspaceDeps) -> Result<Self> {
        let root = root.into();
        let codeforge_dir = root.join(".codeforge");
        std::fs::create_dir_all(&codeforge_dir).map_err(CodeforgeError::ConfigIo)?;

        let config = match std::fs::read_to_string(codeforge_dir.join(CONFIG_FILE_NAME)) {
            Ok(text) => CodeforgeConfig::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => config,
            Err(e) => return Err(CodeforgeError::ConfigIo(e)),
        };

        let fs: Arc<dyn Filesystem> = Arc::new(RealFilesystem::new(&root));

        let audit = Arc::new(AuditLog::open(codeforge_dir.join(AUDIT_FILE_NAME))?);
        let snapshots = Arc::new(SnapshotStore::new(config.apply_engine.snapshot_max_bytes));
        let vcs = deps
            .vcs
            .unwrap_or_else(|| Arc::new(GitCliBackend::new(root.clone())));
        let apply = ApplyEngine::new(
            fs.clone(),
            deps.buffers,
            snapshots,
            vcs,
            config.apply_engine.git_auto_stash_mode,
            audit,
        );

        let mut store = IndexStore::load(codeforge_dir.join(INDEX_FILE_NAME))?;
        if store.migrate_legacy_location(&root.join(LEGACY_INDEX_FILE_NAME))? {
            info!("migrated legacy indexer store into .codeforge/");
        }
        let store = Arc::new(parking_lot::Mutex::new(store));

        let privacy: Arc<dyn PrivacyGate> = Arc::new(StaticPrivacyGate::new(config.privacy.offline));
        let embeddings = if config.privacy.offline {
            Arc::new(codeforge_search::DisabledEmbeddingService) as Arc<dyn EmbeddingService>
        } else {
            deps.embeddings
        };
        let mut exclude_globs = config.indexer.exclude_globs.clone();
        exclude_globs.push("**/.codeforge/**".to_string());
        let builder = Arc::new(IndexBuilder::new(
            fs.clone(),
            deps.extractor,
            embeddings.clone(),
            deps.secrets,
            privacy,
            BuilderConfig {
                exclude_globs: exclude_globs.clone(),
            },
        ));

        let query_embeddings = if embeddings.is_enabled() {
            Some(embeddings)
        } else {
            None
        };
        let query_engine = Arc::new(QueryEngine::new(
            QueryEngineConfig {
                timeout: Duration::from_millis(config.indexer.query_timeout_ms),
                hybrid_weights: config.indexer.resolved_hybrid_weights(),
                ..QueryEngineConfig::default()
            },
            query_embeddings,
        ));
        if !config.indexer.enabled {
            query_engine.disable();
        }

        let maintenance = Arc::new(MaintenanceLoop::new(
            fs.clone(),
            builder.clone(),
            store.clone(),
            MaintenanceConfig {
                parallelism: config.indexer.parallelism,
                cpu_budget_fraction: config.indexer.cpu_budget,
                ..MaintenanceConfig::default()
            },
        ));

        if config.indexer.enabled {
            Self::spawn_watch(root.clone(), maintenance.clone(), exclude_globs);
            Self::spawn_persist_loop(store.clone(), maintenance.clone());
        }

        Ok(Self {
            root,
            config,
            fs,
            apply,
            builder,
            store,
            query_engine,
            maintenance,
        })
    }

    fn spawn_watch(root: PathBuf, maintenance: Arc<MaintenanceLoop>, excludes: Vec<String>) {
        // `watch` is inherent to the concrete filesystem (spec §3: only
        // `RealFilesystem` can observe disk changes), so this builds its
        // own instance rather than downcasting the trait-object `fs` the
        // rest of the workspace shares.
        let watcher = RealFilesystem::new(&root);
        let handle = watcher.watch(WatchOptions {
            recursive: true,
            excludes,
        });
        let mut handle = match handle {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "indexer maintenance disabled: could not watch workspace root");
                return;
            }
        };
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<FileChangeEvent>();
        tokio::spawn(async move {
            while let Some(event) = handle.recv().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
        tokio::spawn(maintenance.run(root, rx));
    }

    fn spawn_persist_loop(store: Arc<parking_lot::Mutex<IndexStore>>, maintenance: Arc<MaintenanceLoop>) {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tick.tick().await;
                if maintenance.persist_ready() {
                    let result = store.lock().persist();
                    match result {
                        Ok(()) => maintenance.mark_persisted(),
                        Err(e) => warn!(error = %e, "failed to persist indexer store"),
                    }
                }
            }
        });
    }

    /// The workspace root every relative URI resolves against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration this workspace was opened with (including any
    /// on-disk overrides).
    pub fn config(&self) -> &CodeforgeConfig {
        &self.config
    }

    /// The filesystem backing this workspace, for callers that need
    /// direct read access alongside `apply_transaction`/`query`.
    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    /// Run one atomic multi-file apply transaction.
    ///
    /// Never returns an `Err` for apply-domain failures — see
    /// [`ApplyOutcome`]'s `error_category` field for the structured
    /// failure reason. The filesystem writes this performs are picked up by the
    /// background watch, which refreshes and eventually persists the
    /// affected index entries; this call does not block on that.
    #[tracing::instrument(skip(self, ops))]
    pub async fn apply_transaction(&self, ops: Vec<RawOperation>, options: ApplyOptions) -> ApplyOutcome {
        let outcome = self.apply.apply_transaction(ops, options).await;
        if outcome.success {
            info!(files = outcome.applied_files.len(), "apply_transaction committed");
        } else {
            warn!(category = ?outcome.error_category, "apply_transaction failed");
        }
        outcome
    }

    /// The indexer's current runtime state: serving queries normally,
    /// turned off by `indexer.enabled = false`, or self-degraded after
    /// sustained high query latency.
    pub fn indexer_state(&self) -> IndexerState {
        self.query_engine.state()
    }

    /// Search the index, returning just the ranked hits.
    ///
    /// Never errors: a cold, disabled, or degraded index returns an
    /// empty list rather than a failure (spec §8's propagation policy).
    pub async fn query(&self, text: &str, k: usize) -> Vec<QueryHit> {
        self.query_with_metrics(text, k).await.results
    }

    /// Search the index, returning the ranked hits plus retrieval
    /// metrics (latency, whether the deadline or early-termination path
    /// was taken, hybrid usage).
    pub async fn query_with_metrics(&self, text: &str, k: usize) -> QueryResult {
        let store = self.store.lock();
        self.query_engine.query(&store, text, k).await
    }

    /// Walk the workspace from scratch, replacing every index entry and
    /// persisting the result. Blocks until the full walk completes —
    /// use [`Workspace::warm_index`] for a non-blocking equivalent on a
    /// cold workspace.
    ///
    /// Clears a self-triggered [`IndexerState::Degraded`] on success,
    /// per spec §4.7's "cleared only on next full rebuild."
    pub async fn rebuild_index(&self) -> Result<()> {
        rebuild_index(&self.root, &self.builder, &self.store, &self.query_engine).await
    }

    /// Schedule a full rebuild in the background and return immediately.
    ///
    /// Intended for workspace open: queries against a cold index return
    /// an empty result set (never an error) while the warmup runs.
    pub fn warm_index(&self) {
        let root = self.root.clone();
        let builder = self.builder.clone();
        let store = self.store.clone();
        let query_engine = self.query_engine.clone();
        tokio::spawn(async move {
            if let Err(e) = rebuild_index(&root, &builder, &store, &query_engine).await {
                warn!(error = %e, "background index warmup failed");
            }
        });
    }
}

async fn rebuild_index(
    root: &Path,
    builder: &IndexBuilder,
    store: &parking_lot::Mutex<IndexStore>,
    query_engine: &QueryEngine,
) -> Result<()> {
    info!("rebuilding index");
    let entries = builder.build_workspace(root).await;
    let count = entries.len();
    {
        let mut store = store.lock();
        store.replace_all(entries);
        store.persist()?;
    }
    query_engine.clear_degraded();
    info!(entries = count, "index rebuild complete");
    Ok(())
}
