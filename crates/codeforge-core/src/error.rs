//! Error types shared by every codeforge crate.
//!
//! `CoreError` is the unified error type for path safety, hashing and
//! (de)serialization failures. `ApplyErrorCategory` is the small closed
//! taxonomy the Apply Engine reports to callers (never as an exception —
//! always as a structured field on the outcome it returns).

use std::io;
use thiserror::Error;

/// Result type alias for codeforge-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors shared across the apply engine, filesystem layer and indexer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The given URI does not resolve inside the workspace root.
    #[error("path escapes workspace: {raw}")]
    PathOutsideWorkspace {
        /// The raw, unresolved path or URI as supplied by the caller.
        raw: String,
    },

    /// The given URI could not be parsed as either a relative path or a
    /// `scheme://` form.
    #[error("malformed uri: {raw}")]
    MalformedUri {
        /// The raw string that failed to parse.
        raw: String,
    },

    /// A numeric parameter failed a positivity/bounds check.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Name of the parameter that failed validation.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An edit operation violated a data-model invariant (e.g. both or
    /// neither of `content`/`text_edits` present).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// True for errors that originate from untrusted external input
    /// (as opposed to internal invariant violations).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CoreError::PathOutsideWorkspace { .. }
                | CoreError::MalformedUri { .. }
                | CoreError::InvalidParameter { .. }
                | CoreError::InvalidOperation(_)
        )
    }
}

/// The closed set of failure categories the Apply Engine reports.
///
/// Per the spec's propagation policy, the Apply Engine never raises these
/// as exceptions — they are always a field on the returned outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyErrorCategory {
    /// A targeted URI resolved outside the workspace; no operation ran.
    BaseMismatch,
    /// A text edit could not be applied to the captured base content.
    HunkApplyFailure,
    /// Path safety rejected the transaction, or a disk/buffer write failed.
    WriteFailure,
    /// Post-apply content hash did not match the expected hash.
    VerificationFailure,
}

impl std::fmt::Display for ApplyErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplyErrorCategory::BaseMismatch => "base_mismatch",
            ApplyErrorCategory::HunkApplyFailure => "hunk_apply_failure",
            ApplyErrorCategory::WriteFailure => "write_failure",
            ApplyErrorCategory::VerificationFailure => "verification_failure",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_outside_workspace_is_input_error() {
        let e = CoreError::PathOutsideWorkspace {
            raw: "/etc/passwd".into(),
        };
        assert!(e.is_input_error());
        assert!(e.to_string().contains("/etc/passwd"));
    }

    #[test]
    fn io_error_is_not_input_error() {
        let e: CoreError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(!e.is_input_error());
    }

    #[test]
    fn apply_error_category_display() {
        assert_eq!(ApplyErrorCategory::BaseMismatch.to_string(), "base_mismatch");
        assert_eq!(
            ApplyErrorCategory::VerificationFailure.to_string(),
            "verification_failure"
        );
    }

    #[test]
    fn apply_error_category_serde_round_trip() {
        let cat = ApplyErrorCategory::HunkApplyFailure;
        let json = serde_json::to_string(&cat).unwrap();
        assert_eq!(json, "\"hunk_apply_failure\"");
        let back: ApplyErrorCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat);
    }
}
