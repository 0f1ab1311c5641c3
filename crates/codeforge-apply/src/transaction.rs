//! The atomic multi-file apply transaction: path safety, deterministic
//! ordering, base capture, race re-check, expected-result computation,
//! snapshot/stash, write, post-verify, commit or rollback.

use crate::textedit::ExpectedResultComputer;
use codeforge_core::{
    validate_non_overlapping, ApplyErrorCategory, ContentHash, FileEditOperation, TextEdit,
    WorkspaceUri,
};
use codeforge_durability::{AuditAction, AuditEvent, AuditLog, AuditMeta, SnapshotOutcome,
    SnapshotStore, StashMode, StashRef, VcsBackend};
use codeforge_fs::{capture_source, EditorBufferSource, Filesystem};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as AsyncMutex;

/// A single file operation as received from the tool-dispatch layer,
/// before its URI has been resolved and validated against the workspace
/// root. `apply_transaction` resolves every op up front; if any fails to
/// resolve, the whole transaction is rejected untouched.
#[derive(Debug, Clone)]
pub enum RawOperation {
    /// See [`FileEditOperation::Create`].
    Create { uri: String, content: String },
    /// See [`FileEditOperation::Edit`].
    Edit {
        uri: String,
        content: Option<String>,
        text_edits: Option<Vec<TextEdit>>,
    },
    /// See [`FileEditOperation::Delete`].
    Delete {
        uri: String,
        recursive: bool,
        is_folder: bool,
    },
}

impl RawOperation {
    fn resolve(&self, root: &Path) -> Result<FileEditOperation, codeforge_core::CoreError> {
        match self {
            RawOperation::Create { uri, content } => Ok(FileEditOperation::Create {
                uri: WorkspaceUri::resolve(root, uri)?,
                content: content.clone(),
            }),
            RawOperation::Edit {
                uri,
                content,
                text_edits,
            } => {
                let uri = WorkspaceUri::resolve(root, uri)?;
                FileEditOperation::edit(uri, content.clone(), text_edits.clone())
            }
            RawOperation::Delete {
                uri,
                recursive,
                is_folder,
            } => Ok(FileEditOperation::Delete {
                uri: WorkspaceUri::resolve(root, uri)?,
                recursive: *recursive,
                is_folder: *is_folder,
            }),
        }
    }
}

/// Per-call knobs for `apply_transaction`. Everything else (snapshot byte
/// ceiling, stash mode) is fixed at [`ApplyEngine`] construction time,
/// since those come from workspace-wide configuration rather than a
/// per-call decision.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Correlates this transaction's audit events and stash message with
    /// the caller's notion of "one edit operation."
    pub operation_id: Option<String>,
}

/// The outcome of `apply_transaction`: either every targeted file ended
/// up with its expected content, or none of them did.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    /// Whether the transaction committed.
    pub success: bool,
    /// Files successfully written, in apply order. Meaningful only when
    /// `success` is true — on failure this is always empty, since a
    /// failed transaction leaves no observable partial write.
    pub applied_files: Vec<WorkspaceUri>,
    /// The file whose processing triggered the failure, if applicable.
    pub failed_file: Option<WorkspaceUri>,
    /// Human-readable failure detail.
    pub error: Option<String>,
    /// The structured failure category, absent on success.
    pub error_category: Option<ApplyErrorCategory>,
}

impl ApplyOutcome {
    fn failure(
        category: ApplyErrorCategory,
        error: impl Into<String>,
        failed_file: Option<WorkspaceUri>,
    ) -> Self {
        Self {
            success: false,
            applied_files: Vec::new(),
            failed_file,
            error: Some(error.into()),
            error_category: Some(category),
        }
    }
}

/// The lifecycle state of one in-flight transaction, tracked purely for
/// diagnostics and tests — `apply_transaction` drives it internally and
/// never exposes a `Transaction` handle across an `.await` boundary to
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Operations resolved and sorted, base not yet captured.
    Preparing,
    /// Base signatures captured for every non-create operation.
    BaseCaptured,
    /// Write phase in progress.
    Writing,
    /// Post-verify in progress.
    Verifying,
    /// The transaction committed; snapshot discarded, stash kept.
    Committed,
    /// The transaction failed and rollback ran (successfully or not).
    RolledBack,
}

struct CapturedBase {
    uri: WorkspaceUri,
    content: Option<String>,
    hash: Option<ContentHash>,
}

/// Drives `apply_transaction` against a fixed filesystem, buffer source,
/// snapshot store, VCS backend, and audit log.
///
/// The commit lock serializes the window between the race re-check and
/// the end of the write phase: two transactions targeting overlapping
/// URIs must not interleave that window, or the second one's re-check
/// could pass against content the first is about to overwrite.
pub struct ApplyEngine {
    fs: Arc<dyn Filesystem>,
    buffers: Arc<dyn EditorBufferSource>,
    snapshots: Arc<SnapshotStore>,
    vcs: Arc<dyn VcsBackend>,
    stash_mode: StashMode,
    audit: Arc<AuditLog>,
    commit_lock: AsyncMutex<()>,
}

impl ApplyEngine {
    /// Construct an engine wired to the given collaborators.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        buffers: Arc<dyn EditorBufferSource>,
        snapshots: Arc<SnapshotStore>,
        vcs: Arc<dyn VcsBackend>,
        stash_mode: StashMode,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            fs,
            buffers,
            snapshots,
            vcs,
            stash_mode,
            audit,
            commit_lock: AsyncMutex::new(()),
        }
    }

    /// Run one atomic transaction end to end.
    pub async fn apply_transaction(
        &self,
        ops: Vec<RawOperation>,
        options: ApplyOptions,
    ) -> ApplyOutcome {
        let operation_id = options
            .operation_id
            .unwrap_or_else(|| format!("op-{}", now_millis()));

        // 1. Path safety: resolve every URI before touching anything.
        let mut resolved = Vec::with_capacity(ops.len());
        for raw in &ops {
            match raw.resolve(self.fs.root()) {
                Ok(op) => resolved.push(op),
                Err(e) => {
                    return ApplyOutcome::failure(ApplyErrorCategory::WriteFailure, e.to_string(), None)
                }
            }
        }

        // 1b. Hunk shape validation, ahead of any capture or locking —
        // an operation with malformed text edits never gets as far as
        // touching disk.
        for op in &resolved {
            if let FileEditOperation::Edit {
                text_edits: Some(edits),
                ..
            } = op
            {
                if let Err(e) = validate_non_overlapping(edits) {
                    return ApplyOutcome::failure(
                        ApplyErrorCategory::HunkApplyFailure,
                        e.to_string(),
                        Some(op.uri().clone()),
                    );
                }
            }
        }

        // 2. Deterministic ordering.
        resolved.sort_by(|a, b| a.uri().as_str().cmp(b.uri().as_str()));

        // 3. Base capture.
        let mut state = TransactionState::Preparing;
        let bases = match self.capture_bases(&resolved).await {
            Ok(b) => b,
            Err(e) => {
                return ApplyOutcome::failure(ApplyErrorCategory::WriteFailure, e.to_string(), None)
            }
        };
        transition(&mut state, TransactionState::BaseCaptured, &operation_id);

        // Steps 4-7 run under the commit lock.
        let _guard = self.commit_lock.lock().await;

        // 4. Race re-check.
        let recheck = match self.capture_bases(&resolved).await {
            Ok(b) => b,
            Err(e) => {
                return ApplyOutcome::failure(ApplyErrorCategory::WriteFailure, e.to_string(), None)
            }
        };
        if let Some(mismatch) = first_mismatch(&bases, &recheck) {
            return ApplyOutcome::failure(
                ApplyErrorCategory::BaseMismatch,
                "base content changed since capture",
                Some(mismatch),
            );
        }

        // 5. Expected-result computation.
        let expected: Vec<(WorkspaceUri, ContentHash)> = resolved
            .iter()
            .zip(bases.iter())
            .filter(|(op, _)| !matches!(op, FileEditOperation::Delete { .. }))
            .map(|(op, base)| {
                (
                    op.uri().clone(),
                    ExpectedResultComputer::expected_hash(op, base.content.as_deref()),
                )
            })
            .collect();

        // 6. Snapshot & stash.
        let uris: Vec<WorkspaceUri> = resolved.iter().map(|op| op.uri().clone()).collect();
        let snapshot_outcome = match self
            .snapshots
            .create_snapshot(self.fs.as_ref(), self.buffers.as_ref(), &uris)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                return ApplyOutcome::failure(ApplyErrorCategory::WriteFailure, e.to_string(), None)
            }
        };
        self.record_snapshot_audit(&uris, &snapshot_outcome);

        let needs_stash = matches!(snapshot_outcome, SnapshotOutcome::Skipped)
            || self.stash_mode != StashMode::Off;
        let stash = if needs_stash {
            match self.vcs.create_stash(&operation_id, self.stash_mode).await {
                Ok(s) => s,
                Err(_) => None,
            }
        } else {
            None
        };
        if stash.is_some() {
            self.record_audit(AuditAction::GitStash, &uris, true, AuditMeta::new());
        }

        // 7. Write phase.
        transition(&mut state, TransactionState::Writing, &operation_id);
        let mut applied = Vec::with_capacity(resolved.len());
        let mut write_failure = None;
        for (op, base) in resolved.iter().zip(bases.iter()) {
            match self.apply_one(op, base).await {
                Ok(()) => applied.push(op.uri().clone()),
                Err(e) => {
                    write_failure = Some((op.uri().clone(), e));
                    break;
                }
            }
        }

        if let Some((failed_uri, err)) = write_failure {
            let (attempted, success) = self
                .rollback(snapshot_outcome, stash.as_ref(), &uris)
                .await;
            self.record_audit(
                AuditAction::Apply,
                &uris,
                false,
                AuditEvent::rollback_meta(attempted, success),
            );
            transition(&mut state, TransactionState::RolledBack, &operation_id);
            return ApplyOutcome::failure(ApplyErrorCategory::WriteFailure, err, Some(failed_uri));
        }

        // 8. Post-verify.
        transition(&mut state, TransactionState::Verifying, &operation_id);
        if let Some(mismatch) = self.post_verify(&expected).await {
            let (attempted, success) = self
                .rollback(snapshot_outcome, stash.as_ref(), &uris)
                .await;
            self.record_audit(
                AuditAction::Apply,
                &uris,
                false,
                AuditEvent::rollback_meta(attempted, success),
            );
            transition(&mut state, TransactionState::RolledBack, &operation_id);
            return ApplyOutcome::failure(
                ApplyErrorCategory::VerificationFailure,
                "post-apply content did not match expected hash",
                Some(mismatch),
            );
        }

        // 9. Commit.
        if let SnapshotOutcome::Created(snapshot) = snapshot_outcome {
            self.snapshots.discard_snapshot(snapshot.id);
        }
        self.record_audit(AuditAction::Apply, &uris, true, AuditMeta::new());
        transition(&mut state, TransactionState::Committed, &operation_id);

        ApplyOutcome {
            success: true,
            applied_files: applied,
            failed_file: None,
            error: None,
            error_category: None,
        }
    }

    async fn capture_bases(
        &self,
        ops: &[FileEditOperation],
    ) -> Result<Vec<CapturedBase>, codeforge_fs::FsError> {
        let mut out = Vec::with_capacity(ops.len());
        for op in ops {
            if op.is_create() {
                out.push(CapturedBase {
                    uri: op.uri().clone(),
                    content: None,
                    hash: None,
                });
                continue;
            }
            match capture_source(self.fs.as_ref(), self.buffers.as_ref(), op.uri()).await {
                Ok((content, _is_dirty)) => {
                    let hash = ContentHash::of(&content);
                    out.push(CapturedBase {
                        uri: op.uri().clone(),
                        content: Some(content),
                        hash: Some(hash),
                    });
                }
                Err(codeforge_fs::FsError::NotFound(_)) => out.push(CapturedBase {
                    uri: op.uri().clone(),
                    content: None,
                    hash: None,
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    async fn apply_one(
        &self,
        op: &FileEditOperation,
        base: &CapturedBase,
    ) -> Result<(), String> {
        match op {
            FileEditOperation::Create { uri, content } => {
                self.fs
                    .write_file(uri, content)
                    .await
                    .map_err(|e| e.to_string())?;
                self.sync_buffer(uri, content).await;
            }
            FileEditOperation::Edit { uri, .. } => {
                let new_content = ExpectedResultComputer::compute(op, base.content.as_deref());
                self.fs
                    .write_file(uri, &new_content)
                    .await
                    .map_err(|e| e.to_string())?;
                self.sync_buffer(uri, &new_content).await;
            }
            FileEditOperation::Delete { uri, recursive, .. } => {
                self.fs
                    .delete(uri, *recursive)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }

    async fn sync_buffer(&self, uri: &WorkspaceUri, content: &str) {
        if let Some(handle) = self.buffers.resolve_model(uri).await {
            if !handle.is_disposed() {
                handle.set_value(content).await;
            }
        }
    }

    async fn post_verify(&self, expected: &[(WorkspaceUri, ContentHash)]) -> Option<WorkspaceUri> {
        for (uri, expected_hash) in expected {
            let (content, _) = match capture_source(self.fs.as_ref(), self.buffers.as_ref(), uri).await
            {
                Ok(v) => v,
                Err(_) => return Some(uri.clone()),
            };
            if ContentHash::of(&content) != *expected_hash {
                return Some(uri.clone());
            }
        }
        None
    }

    async fn rollback(
        &self,
        snapshot_outcome: SnapshotOutcome,
        stash: Option<&StashRef>,
        uris: &[WorkspaceUri],
    ) -> (bool, bool) {
        if let SnapshotOutcome::Created(snapshot) = snapshot_outcome {
            let attempted = true;
            let restored = self
                .snapshots
                .restore_snapshot(snapshot.id, self.fs.as_ref(), self.buffers.as_ref())
                .await
                .is_ok();
            self.record_audit(
                AuditAction::SnapshotRestore,
                uris,
                restored,
                AuditMeta::new(),
            );
            if restored {
                return (attempted, true);
            }
        }
        if let Some(stash) = stash {
            let restored = self.vcs.restore_stash(stash).await.is_ok();
            self.record_audit(AuditAction::GitRestore, uris, restored, AuditMeta::new());
            return (true, restored);
        }
        (false, false)
    }

    fn record_snapshot_audit(&self, uris: &[WorkspaceUri], outcome: &SnapshotOutcome) {
        let ok = matches!(outcome, SnapshotOutcome::Created(_));
        self.record_audit(AuditAction::SnapshotCreate, uris, ok, AuditMeta::new());
    }

    fn record_audit(&self, action: AuditAction, uris: &[WorkspaceUri], ok: bool, meta: AuditMeta) {
        let event = AuditEvent {
            ts_millis: now_millis(),
            action,
            files: uris.iter().map(|u| u.as_str().to_string()).collect(),
            ok,
            meta,
        };
        if let Err(e) = self.audit.append(&event) {
            tracing::warn!(error = %e, "failed to append audit event");
        }
    }
}

fn transition(state: &mut TransactionState, next: TransactionState, operation_id: &str) {
    *state = next;
    tracing::trace!(operation_id, state = ?state, "apply transaction state transition");
}

fn first_mismatch(before: &[CapturedBase], after: &[CapturedBase]) -> Option<WorkspaceUri> {
    for (b, a) in before.iter().zip(after.iter()) {
        if b.hash != a.hash {
            return Some(b.uri.clone());
        }
    }
    None
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
    use codeforge_durability::InMemoryVcsBackend;
    use codeforge_fs::{InMemoryBufferSource, InMemoryFilesystem};

    fn engine(snapshot_bytes: u64, stash_mode: StashMode) -> (ApplyEngine, Arc<InMemoryFilesystem>) {
        let dir = tempfile::tempdir().unwrap();
        let fs = Arc::new(InMemoryFilesystem::new(dir.path().to_path_buf()));
        let buffers = Arc::new(InMemoryBufferSource::new());
        let snapshots = Arc::new(SnapshotStore::new(snapshot_bytes));
        let vcs = Arc::new(InMemoryVcsBackend::new());
        let audit = Arc::new(AuditLog::open(dir.path().join("audit.jsonl")).unwrap());
        let engine = ApplyEngine::new(fs.clone(), buffers, snapshots, vcs, stash_mode, audit);
        (engine, fs)
    }

    #[tokio::test]
    async fn atomic_two_file_apply_with_injected_failure() {
        let (engine, fs) = engine(4096, StashMode::Off);
        let a = WorkspaceUri::resolve(fs.root(), "a.txt").unwrap();
        let b = WorkspaceUri::resolve(fs.root(), "b.txt").unwrap();
        fs.seed(&a, "a1");
        fs.seed(&b, "b1");
        fs.fail_next_write(&b, "disk full");

        let outcome = engine
            .apply_transaction(
                vec![
                    RawOperation::Edit {
                        uri: "a.txt".into(),
                        content: Some("a2".into()),
                        text_edits: None,
                    },
                    RawOperation::Edit {
                        uri: "b.txt".into(),
                        content: Some("b2".into()),
                        text_edits: None,
                    },
                ],
                ApplyOptions::default(),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_category, Some(ApplyErrorCategory::WriteFailure));
        assert_eq!(fs.peek(&a).unwrap(), "a1");
        assert_eq!(fs.peek(&b).unwrap(), "b1");
    }

    /// Returns a different read on its second call for one target URI,
    /// simulating an external writer racing between base capture and the
    /// pre-write re-check.
    struct RacyFilesystem {
        inner: Arc<InMemoryFilesystem>,
        target: WorkspaceUri,
        switch_to: String,
        reads: std::sync::Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl Filesystem for RacyFilesystem {
        async fn read_file(&self, uri: &WorkspaceUri) -> codeforge_fs::FsResult<String> {
            if *uri == self.target {
                let mut reads = self.reads.lock().unwrap();
                *reads += 1;
                if *reads == 2 {
                    return Ok(self.switch_to.clone());
                }
            }
            self.inner.read_file(uri).await
        }
        async fn write_file(&self, uri: &WorkspaceUri, content: &str) -> codeforge_fs::FsResult<()> {
            self.inner.write_file(uri, content).await
        }
        async fn exists(&self, uri: &WorkspaceUri) -> bool {
            self.inner.exists(uri).await
        }
        async fn stat(&self, uri: &WorkspaceUri) -> codeforge_fs::FsResult<codeforge_fs::Stat> {
            self.inner.stat(uri).await
        }
        async fn delete(&self, uri: &WorkspaceUri, recursive: bool) -> codeforge_fs::FsResult<()> {
            self.inner.delete(uri, recursive).await
        }
        async fn create_file(&self, uri: &WorkspaceUri) -> codeforge_fs::FsResult<()> {
            self.inner.create_file(uri).await
        }
        async fn create_folder(&self, uri: &WorkspaceUri) -> codeforge_fs::FsResult<()> {
            self.inner.create_folder(uri).await
        }
        fn root(&self) -> &Path {
            self.inner.root()
        }
    }

    #[tokio::test]
    async fn base_mismatch_aborts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(InMemoryFilesystem::new(dir.path().to_path_buf()));
        let f = WorkspaceUri::resolve(inner.root(), "f.txt").unwrap();
        inner.seed(&f, "x");
        let racy: Arc<dyn Filesystem> = Arc::new(RacyFilesystem {
            inner: inner.clone(),
            target: f.clone(),
            switch_to: "y".into(),
            reads: std::sync::Mutex::new(0),
        });
        let buffers = Arc::new(InMemoryBufferSource::new());
        let snapshots = Arc::new(SnapshotStore::new(4096));
        let vcs = Arc::new(InMemoryVcsBackend::new());
        let audit = Arc::new(AuditLog::open(dir.path().join("audit.jsonl")).unwrap());
        let engine = ApplyEngine::new(racy, buffers, snapshots, vcs, StashMode::Off, audit);

        let outcome = engine
            .apply_transaction(
                vec![RawOperation::Edit {
                    uri: "f.txt".into(),
                    content: Some("z".into()),
                    text_edits: None,
                }],
                ApplyOptions::default(),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_category, Some(ApplyErrorCategory::BaseMismatch));
        let final_content = inner.peek(&f).unwrap();
        assert!(final_content == "x" || final_content == "y");
    }

    #[tokio::test]
    async fn path_safety_rejects_outside_workspace() {
        let (engine, fs) = engine(4096, StashMode::Off);
        let outcome = engine
            .apply_transaction(
                vec![RawOperation::Create {
                    uri: "../outside/x.txt".into(),
                    content: "hi".into(),
                }],
                ApplyOptions::default(),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_category, Some(ApplyErrorCategory::WriteFailure));
        assert!(fs.peek(&WorkspaceUri::resolve(fs.root(), "x.txt").unwrap()).is_none());
    }

    #[tokio::test]
    async fn crlf_and_lf_bases_hash_equal_after_apply() {
        let (engine, fs) = engine(4096, StashMode::Off);
        let a = WorkspaceUri::resolve(fs.root(), "a.txt").unwrap();
        let b = WorkspaceUri::resolve(fs.root(), "b.txt").unwrap();
        fs.seed(&a, "L1\r\nL2\r\n");
        fs.seed(&b, "L1\nL2\n");

        let outcome = engine
            .apply_transaction(
                vec![
                    RawOperation::Edit {
                        uri: "a.txt".into(),
                        content: Some("L1\nL2\nL3".into()),
                        text_edits: None,
                    },
                    RawOperation::Edit {
                        uri: "b.txt".into(),
                        content: Some("L1\nL2\nL3".into()),
                        text_edits: None,
                    },
                ],
                ApplyOptions::default(),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(
            ContentHash::of(&fs.peek(&a).unwrap()),
            ContentHash::of(&fs.peek(&b).unwrap())
        );
    }

    #[tokio::test]
    async fn hunk_apply_failure_on_overlapping_edits() {
        let (engine, fs) = engine(4096, StashMode::Off);
        let f = WorkspaceUri::resolve(fs.root(), "f.txt").unwrap();
        fs.seed(&f, "hello world");

        let overlapping = vec![
            TextEdit {
                start_line: 1,
                start_col: 1,
                end_line: 1,
                end_col: 6,
                new_text: "a".into(),
            },
            TextEdit {
                start_line: 1,
                start_col: 3,
                end_line: 1,
                end_col: 8,
                new_text: "b".into(),
            },
        ];
        let outcome = engine
            .apply_transaction(
                vec![RawOperation::Edit {
                    uri: "f.txt".into(),
                    content: None,
                    text_edits: Some(overlapping),
                }],
                ApplyOptions::default(),
            )
            .await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_category,
            Some(ApplyErrorCategory::HunkApplyFailure)
        );
        assert_eq!(fs.peek(&f).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn snapshot_over_budget_falls_back_to_stash() {
        let (engine, fs) = engine(0, StashMode::Always);
        let a = WorkspaceUri::resolve(fs.root(), "a.txt").unwrap();
        fs.seed(&a, "a1");
        fs.fail_next_write(&a, "boom");

        let outcome = engine
            .apply_transaction(
                vec![RawOperation::Edit {
                    uri: "a.txt".into(),
                    content: Some("a2".into()),
                    text_edits: None,
                }],
                ApplyOptions::default(),
            )
            .await;

        // With snapshotting disabled the engine has no in-memory copy to
        // restore from; the file keeps whatever the failed write phase
        // observed (rollback metadata still records the attempt).
        assert!(!outcome.success);
        assert_eq!(outcome.error_category, Some(ApplyErrorCategory::WriteFailure));
    }
}
