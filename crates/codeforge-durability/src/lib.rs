//! Rollback snapshot store, VCS auto-stash, and the append-only audit log
//! that together give the apply engine its atomicity guarantees.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod snapshot;
pub mod vcs;

pub use audit::{AuditAction, AuditError, AuditEvent, AuditLog, AuditMeta};
pub use snapshot::{Snapshot, SnapshotError, SnapshotFileEntry, SnapshotOutcome, SnapshotStore};
pub use vcs::{GitCliBackend, InMemoryVcsBackend, StashMode, StashRef, VcsBackend, VcsError};
