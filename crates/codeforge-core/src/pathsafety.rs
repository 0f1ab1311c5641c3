//! Tool Parameter Validation & Path Safety.
//!
//! A small set of pure validators shared by the Apply Engine and the
//! Indexer's citation-returning query path. These are the single source
//! of truth for sanitizing external input — nothing downstream should
//! re-implement URI resolution or bounds checking.

use crate::error::CoreError;
use std::path::{Component, Path, PathBuf};

/// A path that has been resolved against a workspace root and verified
/// to lie inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct WorkspaceUri(String);

impl WorkspaceUri {
    /// The path relative to the workspace root, using `/` separators.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve `raw` against `root`, rejecting anything that would
    /// escape `root`.
    ///
    /// Handles three input shapes:
    /// - A path relative to the workspace root.
    /// - An absolute path that must itself lie inside `root`.
    /// - A `scheme://` URI, whose path component is resolved the same way.
    ///
    /// Special-cases a common LLM mistake: a relative path that is
    /// needlessly prefixed with the workspace folder's own name (e.g. the
    /// workspace is `/ws/myproj` and the model sends `myproj/src/lib.rs`
    /// instead of `src/lib.rs`) — this is stripped before resolution.
    pub fn resolve(root: &Path, raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty() {
            return Err(CoreError::MalformedUri { raw: raw.into() });
        }

        let candidate_path = if let Some(idx) = raw.find("://") {
            let scheme = &raw[..idx];
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
                return Err(CoreError::MalformedUri { raw: raw.into() });
            }
            &raw[idx + 3..]
        } else {
            raw
        };

        let stripped = strip_workspace_folder_prefix(root, candidate_path);

        let joined: PathBuf = if Path::new(stripped).is_absolute() {
            PathBuf::from(stripped)
        } else {
            root.join(stripped)
        };

        let normalized = normalize_lexically(&joined);
        let root_normalized = normalize_lexically(root);

        let relative = normalized
            .strip_prefix(&root_normalized)
            .map_err(|_| CoreError::PathOutsideWorkspace { raw: raw.into() })?;

        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(CoreError::PathOutsideWorkspace { raw: raw.into() });
        }

        let rel_str = relative.to_string_lossy().replace('\\', "/");
        Ok(WorkspaceUri(rel_str))
    }

    /// Join back onto a filesystem root for an actual I/O call.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl std::fmt::Display for WorkspaceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip a leading `<workspace-folder-name>/` segment from `raw` if the
/// workspace folder's own basename was mistakenly included.
fn strip_workspace_folder_prefix<'a>(root: &Path, raw: &'a str) -> &'a str {
    let Some(folder_name) = root.file_name().and_then(|n| n.to_str()) else {
        return raw;
    };
    let prefix = format!("{folder_name}/");
    raw.strip_prefix(&prefix).unwrap_or(raw)
}

/// Resolve `.`/`..` components without touching the filesystem (the
/// target need not exist yet, e.g. for `create`).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Validate a 1-indexed line number.
pub fn validate_line(n: i64) -> Result<u32, CoreError> {
    if n < 1 {
        return Err(CoreError::InvalidParameter {
            name: "line",
            reason: format!("must be >= 1, got {n}"),
        });
    }
    Ok(n as u32)
}

/// Validate a 1-indexed column number.
pub fn validate_column(n: i64) -> Result<u32, CoreError> {
    if n < 1 {
        return Err(CoreError::InvalidParameter {
            name: "column",
            reason: format!("must be >= 1, got {n}"),
        });
    }
    Ok(n as u32)
}

/// Validate a boolean-ish parameter, defaulting when absent.
pub fn validate_bool(v: Option<bool>, default: bool) -> bool {
    v.unwrap_or(default)
}

/// Validate a page number against a bounded default and maximum.
pub fn validate_page(n: Option<i64>, default: u32, max: u32) -> Result<u32, CoreError> {
    match n {
        None => Ok(default),
        Some(n) if n < 1 => Err(CoreError::InvalidParameter {
            name: "page",
            reason: format!("must be >= 1, got {n}"),
        }),
        Some(n) if n as u64 > max as u64 => Err(CoreError::InvalidParameter {
            name: "page",
            reason: format!("must be <= {max}, got {n}"),
        }),
        Some(n) => Ok(n as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_resolves_inside_workspace() {
        let root = Path::new("/ws");
        let uri = WorkspaceUri::resolve(root, "src/lib.rs").unwrap();
        assert_eq!(uri.as_str(), "src/lib.rs");
    }

    #[test]
    fn absolute_path_outside_workspace_rejected() {
        let root = Path::new("/ws");
        let err = WorkspaceUri::resolve(root, "/outside/x.txt").unwrap_err();
        assert!(matches!(err, CoreError::PathOutsideWorkspace { .. }));
    }

    #[test]
    fn parent_traversal_rejected() {
        let root = Path::new("/ws");
        let err = WorkspaceUri::resolve(root, "../outside.txt").unwrap_err();
        assert!(matches!(err, CoreError::PathOutsideWorkspace { .. }));
    }

    #[test]
    fn scheme_form_is_resolved() {
        let root = Path::new("/ws");
        let uri = WorkspaceUri::resolve(root, "file:///ws/a.txt").unwrap();
        assert_eq!(uri.as_str(), "a.txt");
    }

    #[test]
    fn workspace_folder_prefix_mistake_is_stripped() {
        let root = Path::new("/ws/myproj");
        let uri = WorkspaceUri::resolve(root, "myproj/src/lib.rs").unwrap();
        assert_eq!(uri.as_str(), "src/lib.rs");
    }

    #[test]
    fn empty_raw_rejected() {
        let root = Path::new("/ws");
        assert!(WorkspaceUri::resolve(root, "").is_err());
        assert!(WorkspaceUri::resolve(root, "   ").is_err());
    }

    #[test]
    fn validate_line_rejects_zero_and_negative() {
        assert!(validate_line(1).is_ok());
        assert!(validate_line(0).is_err());
        assert!(validate_line(-5).is_err());
    }

    #[test]
    fn validate_page_defaults_and_bounds() {
        assert_eq!(validate_page(None, 1, 100).unwrap(), 1);
        assert_eq!(validate_page(Some(50), 1, 100).unwrap(), 50);
        assert!(validate_page(Some(0), 1, 100).is_err());
        assert!(validate_page(Some(101), 1, 100).is_err());
    }

    #[test]
    fn validate_bool_defaults() {
        assert!(validate_bool(None, true));
        assert!(!validate_bool(Some(false), true));
    }
}
