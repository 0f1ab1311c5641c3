//! Append-only audit log of apply and rollback events.
//!
//! Writes fsync per record so that a crash between an apply's start and
//! its commit still leaves a durable trace that the outcome was never
//! committed. Readers tolerate a truncated final line, the shape a
//! crash mid-write leaves behind.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The kind of event recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An `apply_transaction` call completed (successfully or not).
    Apply,
    /// A rollback snapshot was created.
    SnapshotCreate,
    /// A rollback snapshot was restored.
    SnapshotRestore,
    /// A VCS stash was created.
    GitStash,
    /// A VCS stash was restored.
    GitRestore,
}

/// Free-form metadata carried alongside an event, kept intentionally
/// open-ended so new fields don't require a schema migration.
pub type AuditMeta = serde_json::Map<String, serde_json::Value>;

/// One immutable, append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Milliseconds since the Unix epoch.
    pub ts_millis: u128,
    /// What kind of event this is.
    pub action: AuditAction,
    /// The workspace-relative file URIs this event concerns.
    pub files: Vec<String>,
    /// Whether the action succeeded.
    pub ok: bool,
    /// Extra structured detail (error category, rollback status, etc).
    #[serde(default)]
    pub meta: AuditMeta,
}

impl AuditEvent {
    /// Build a meta map with a single `rollback_attempted`/`rollback_success`
    /// pair, the shape `apply` failure events always carry.
    pub fn rollback_meta(attempted: bool, success: bool) -> AuditMeta {
        let mut meta = AuditMeta::new();
        meta.insert("rollback_attempted".into(), attempted.into());
        meta.insert("rollback_success".into(), success.into());
        meta
    }
}

/// Errors from reading or writing the audit log.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The underlying file I/O failed.
    #[error("audit log io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single append-only JSON-lines file, one [`AuditEvent`] per line.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl AuditLog {
    /// Open (creating if absent) the audit log at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one event, fsyncing before returning so the record survives
    /// a crash immediately after this call.
    pub fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let line = serde_json::to_string(event).map_err(|e| {
            AuditError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{line}")?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    /// Read every complete record. A truncated final line (e.g. a record
    /// cut short by a crash mid-write) is silently dropped rather than
    /// treated as an error.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        let file = match std::fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(&line) {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        Ok(events)
    }

    /// The path backing this log.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
