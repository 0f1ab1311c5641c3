//! Maintenance Loop (spec §4.8): incremental index upkeep driven by
//! filesystem-change events, debounced and CPU-budgeted.

use crate::builder::IndexBuilder;
use crate::store::IndexStore;
use codeforge_core::WorkspaceUri;
use codeforge_fs::{FileChangeEvent, Filesystem};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for [`MaintenanceLoop`], mapped from the `indexer.*` config
/// keys.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// How long a create/update stays pending, coalescing bursts, before
    /// its entry is refreshed.
    pub refresh_debounce: Duration,
    /// How long the persisted index stays dirty before it's written.
    pub persist_debounce: Duration,
    /// Entries refreshed concurrently per batch (`indexer.parallelism`).
    pub parallelism: usize,
    /// Fraction of one CPU core a refresh pass may consume before
    /// yielding cooperatively.
    pub cpu_budget_fraction: f64,
    /// How often the CPU budget is sampled during a refresh pass.
    pub cpu_sample_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            refresh_debounce: Duration::from_secs(3),
            persist_debounce: Duration::from_secs(5),
            parallelism: 2,
            cpu_budget_fraction: 0.2,
            cpu_sample_interval: Duration::from_millis(100),
        }
    }
}

/// Tracks wall-clock-vs-work-time ratio over a sampling window, yielding
/// the task once the ratio exceeds the configured budget.
struct CpuBudget {
    fraction: f64,
    sample_interval: Duration,
    window_start: Instant,
    work_accum: Duration,
}

impl CpuBudget {
    fn new(fraction: f64, sample_interval: Duration) -> Self {
        Self {
            fraction,
            sample_interval,
            window_start: Instant::now(),
            work_accum: Duration::ZERO,
        }
    }

    async fn charge(&mut self, work: Duration) {
        self.work_accum += work;
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.sample_interval {
            let ratio = self.work_accum.as_secs_f64() / elapsed.as_secs_f64().max(0.001);
            self.window_start = Instant::now();
            self.work_accum = Duration::ZERO;
            if ratio > self.fraction {
                tokio::task::yield_now().await;
            }
        }
    }
}

/// Drives incremental updates to an [`IndexStore`] from a stream of
/// [`FileChangeEvent`] batches: synchronous removal on delete, debounced
/// and CPU-budgeted refresh on create/update.
pub struct MaintenanceLoop {
    fs: Arc<dyn Filesystem>,
    builder: Arc<IndexBuilder>,
    store: Arc<Mutex<IndexStore>>,
    config: MaintenanceConfig,
    dirty: Mutex<HashMap<String, Instant>>,
    persist_dirty_since: Mutex<Option<Instant>>,
}

impl MaintenanceLoop {
    /// Build a loop over the given store and builder.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        builder: Arc<IndexBuilder>,
        store: Arc<Mutex<IndexStore>>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            fs,
            builder,
            store,
            config,
            dirty: Mutex::new(HashMap::new()),
            persist_dirty_since: Mutex::new(None),
        }
    }

    /// Apply one change batch. Deletions are synchronous, per §5's
    /// ordering guarantee; creates/updates mark the URI dirty, with a
    /// later event's timestamp superseding an earlier pending one for
    /// the same URI (coalescing, not queueing duplicates).
    pub fn handle_event(&self, event: FileChangeEvent) {
        if !event.deleted.is_empty() {
            let mut store = self.store.lock();
            let mut dirty = self.dirty.lock();
            for uri in &event.deleted {
                store.remove(uri.as_str());
                dirty.remove(uri.as_str());
            }
        }
        if !event.added.is_empty() || !event.updated.is_empty() {
            let mut dirty = self.dirty.lock();
            let now = Instant::now();
            for uri in event.added.iter().chain(event.updated.iter()) {
                dirty.insert(uri.as_str().to_string(), now);
            }
        }
    }

    /// URIs whose debounce window has elapsed, removed from the pending
    /// set. Left-over entries (still within their window) stay pending
    /// for the next call.
    fn take_ready(&self) -> Vec<String> {
        let now = Instant::now();
        let mut dirty = self.dirty.lock();
        let ready: Vec<String> = dirty
            .iter()
            .filter(|(_, since)| now.duration_since(**since) >= self.config.refresh_debounce)
            .map(|(uri, _)| uri.clone())
            .collect();
        for uri in &ready {
            dirty.remove(uri);
        }
        ready
    }

    /// Number of URIs currently pending a debounced refresh.
    pub fn pending_count(&self) -> usize {
        self.dirty.lock().len()
    }

    /// Rebuild whichever pending URIs are past their debounce window, in
    /// `parallelism`-sized batches, yielding cooperatively once the
    /// sampled CPU budget is exceeded. Returns the number refreshed.
    pub async fn refresh_pass(&self, root: &Path) -> usize {
        let ready = self.take_ready();
        if ready.is_empty() {
            return 0;
        }
        let mut budget = CpuBudget::new(self.config.cpu_budget_fraction, self.config.cpu_sample_interval);
        let mut refreshed = 0usize;
        for batch in ready.chunks(self.config.parallelism.max(1)) {
            let batch_start = Instant::now();
            let mut handles = Vec::with_capacity(batch.len());
            for uri_str in batch {
                let Ok(uri) = WorkspaceUri::resolve(root, uri_str) else {
                    continue;
                };
                let fs = self.fs.clone();
                let builder = self.builder.clone();
                handles.push(tokio::spawn(async move {
                    let content = fs.read_file(&uri).await.ok()?;
                    Some(builder.build_entry(uri, &content).await)
                }));
            }
            for handle in handles {
                if let Ok(Some(entry)) = handle.await {
                    self.store.lock().upsert(entry);
                    refreshed += 1;
                }
            }
            budget.charge(batch_start.elapsed()).await;
        }
        if refreshed > 0 {
            self.mark_refresh_dirty();
        }
        refreshed
    }

    fn mark_refresh_dirty(&self) {
        let mut marker = self.persist_dirty_since.lock();
        if marker.is_none() {
            *marker = Some(Instant::now());
        }
    }

    /// Whether the persisted index has been dirty long enough to flush
    /// (`indexer`'s second, disk-write debounce).
    pub fn persist_ready(&self) -> bool {
        self.persist_dirty_since
            .lock()
            .is_some_and(|since| since.elapsed() >= self.config.persist_debounce)
    }

    /// Clear the persist-dirty marker after the caller has written the
    /// index to disk.
    pub fn mark_persisted(&self) {
        *self.persist_dirty_since.lock() = None;
    }

    /// Drive the loop forever: apply incoming change batches as they
    /// arrive, and run a refresh pass on the CPU-budget sampling cadence.
    pub async fn run(
        self: Arc<Self>,
        root: PathBuf,
        mut events: tokio::sync::mpsc::UnboundedReceiver<FileChangeEvent>,
    ) {
        let mut tick = tokio::time::interval(self.config.cpu_sample_interval);
        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    self.refresh_pass(&root).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderConfig;
    use crate::extractor::RegexSymbolExtractor;
    use crate::services::{DisabledEmbeddingService, NoopSecretDetector, StaticPrivacyGate};
    use codeforge_fs::InMemoryFilesystem;

    fn test_loop(refresh_debounce: Duration) -> (MaintenanceLoop, Arc<InMemoryFilesystem>, Arc<Mutex<IndexStore>>) {
        let fs = Arc::new(InMemoryFilesystem::new(Path::new("/ws")));
        let builder = Arc::new(IndexBuilder::new(
            fs.clone(),
            Box::new(RegexSymbolExtractor),
            Arc::new(DisabledEmbeddingService),
            Arc::new(NoopSecretDetector),
            Arc::new(StaticPrivacyGate::new(false)),
            BuilderConfig::default(),
        ));
        let store = Arc::new(Mutex::new(IndexStore::new("/tmp/maintenance-test-unused.json")));
        let config = MaintenanceConfig {
            refresh_debounce,
            persist_debounce: Duration::from_millis(20),
            parallelism: 2,
            cpu_budget_fraction: 1.0,
            cpu_sample_interval: Duration::from_millis(10),
        };
        (
            MaintenanceLoop::new(fs.clone(), builder, store.clone(), config),
            fs,
            store,
        )
    }

    #[test]
    fn delete_event_removes_entry_and_clears_pending_dirty() {
        let (loop_, _fs, store) = test_loop(Duration::from_secs(60));
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        let mut entry = crate::model::IndexEntry {
            uri: uri.clone(),
            symbols: Vec::new(),
            snippet: "fn a() {}".to_string(),
            snippet_start_line: 1,
            snippet_end_line: 1,
            chunks: Vec::new(),
            snippet_tokens: Vec::new(),
            uri_tokens: Vec::new(),
            symbol_tokens: Vec::new(),
            imported_symbols: Vec::new(),
            imported_from: Vec::new(),
            snippet_embedding: None,
        };
        entry.backfill_tokens();
        store.lock().upsert(entry);

        loop_.handle_event(FileChangeEvent {
            added: vec![uri.clone()],
            updated: Vec::new(),
            deleted: Vec::new(),
        });
        assert_eq!(loop_.pending_count(), 1);

        loop_.handle_event(FileChangeEvent {
            added: Vec::new(),
            updated: Vec::new(),
            deleted: vec![uri],
        });
        assert_eq!(loop_.pending_count(), 0);
        assert!(store.lock().is_empty());
    }

    #[test]
    fn repeated_updates_to_same_uri_coalesce_into_one_pending_entry() {
        let (loop_, _fs, _store) = test_loop(Duration::from_secs(60));
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        for _ in 0..5 {
            loop_.handle_event(FileChangeEvent {
                added: Vec::new(),
                updated: vec![uri.clone()],
                deleted: Vec::new(),
            });
        }
        assert_eq!(loop_.pending_count(), 1);
    }

    #[tokio::test]
    async fn refresh_pass_waits_for_debounce_window() {
        let (loop_, fs, _store) = test_loop(Duration::from_millis(30));
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        fs.seed(&uri, "fn a() {}");
        loop_.handle_event(FileChangeEvent {
            added: vec![uri],
            updated: Vec::new(),
            deleted: Vec::new(),
        });

        let refreshed_immediately = loop_.refresh_pass(Path::new("/ws")).await;
        assert_eq!(refreshed_immediately, 0);
        assert_eq!(loop_.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        let refreshed_after_wait = loop_.refresh_pass(Path::new("/ws")).await;
        assert_eq!(refreshed_after_wait, 1);
        assert_eq!(loop_.pending_count(), 0);
    }

    #[tokio::test]
    async fn successful_refresh_marks_persist_dirty_and_respects_its_own_debounce() {
        let (loop_, fs, store) = test_loop(Duration::from_millis(1));
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        fs.seed(&uri, "fn a() {}");
        loop_.handle_event(FileChangeEvent {
            added: vec![uri],
            updated: Vec::new(),
            deleted: Vec::new(),
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let refreshed = loop_.refresh_pass(Path::new("/ws")).await;
        assert_eq!(refreshed, 1);
        assert_eq!(store.lock().len(), 1);

        assert!(!loop_.persist_ready());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(loop_.persist_ready());
        loop_.mark_persisted();
        assert!(!loop_.persist_ready());
    }
}
