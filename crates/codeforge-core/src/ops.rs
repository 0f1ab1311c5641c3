//! The edit-operation data model (spec §3: `FileEditOperation`,
//! `FileBaseSignature`, `ExpectedFileResult`).

use crate::error::CoreError;
use crate::hash::ContentHash;
use crate::pathsafety::WorkspaceUri;

/// One file mutation requested by the model.
///
/// Invariants (enforced at construction):
/// - `uri` lies inside the workspace (checked by the caller via
///   [`WorkspaceUri::resolve`] before this type is ever built).
/// - For `Edit`, exactly one of `content`/`text_edits` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEditOperation {
    /// Create a new file with the given content.
    Create {
        /// Target location.
        uri: WorkspaceUri,
        /// Full file content.
        content: String,
    },
    /// Modify an existing file, either wholesale or via text edits.
    Edit {
        /// Target location.
        uri: WorkspaceUri,
        /// Full replacement content, if this is a whole-file edit.
        content: Option<String>,
        /// Targeted text edits, if this is a hunk-based edit.
        text_edits: Option<Vec<TextEdit>>,
    },
    /// Remove a file or folder.
    Delete {
        /// Target location.
        uri: WorkspaceUri,
        /// Whether a folder delete should recurse into its contents.
        recursive: bool,
        /// Whether `uri` names a folder rather than a file.
        is_folder: bool,
    },
}

impl FileEditOperation {
    /// Construct an `Edit` operation, enforcing the content/text-edits
    /// mutual-exclusivity invariant.
    pub fn edit(
        uri: WorkspaceUri,
        content: Option<String>,
        text_edits: Option<Vec<TextEdit>>,
    ) -> Result<Self, CoreError> {
        match (&content, &text_edits) {
            (Some(_), Some(_)) => Err(CoreError::InvalidOperation(
                "edit operation must not set both content and text_edits".into(),
            )),
            (None, None) => Err(CoreError::InvalidOperation(
                "edit operation must set exactly one of content or text_edits".into(),
            )),
            _ => Ok(FileEditOperation::Edit {
                uri,
                content,
                text_edits,
            }),
        }
    }

    /// The URI this operation targets.
    pub fn uri(&self) -> &WorkspaceUri {
        match self {
            FileEditOperation::Create { uri, .. } => uri,
            FileEditOperation::Edit { uri, .. } => uri,
            FileEditOperation::Delete { uri, .. } => uri,
        }
    }

    /// True if this operation creates a file that must not already exist
    /// as a precondition for base capture (creates have no base).
    pub fn is_create(&self) -> bool {
        matches!(self, FileEditOperation::Create { .. })
    }
}

/// A single targeted text replacement.
///
/// Ranges are 1-indexed and half-open in the end column: the character at
/// `end_col` itself is *not* replaced. `end_line`/`end_col` may exceed the
/// actual line length, in which case they are clamped to the line length
/// before the edit is applied (see `codeforge-apply`'s
/// `ExpectedResultComputer`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// 1-indexed start line.
    pub start_line: u32,
    /// 1-indexed start column.
    pub start_col: u32,
    /// 1-indexed end line.
    pub end_line: u32,
    /// 1-indexed, half-open end column.
    pub end_col: u32,
    /// Replacement text, which may itself span multiple lines.
    pub new_text: String,
}

impl TextEdit {
    /// The `(line, col)` pair this edit starts at, for sort ordering.
    pub fn start(&self) -> (u32, u32) {
        (self.start_line, self.start_col)
    }
}

/// Validate that a set of text edits for one operation do not overlap,
/// per the spec's "non-overlapping" invariant.
pub fn validate_non_overlapping(edits: &[TextEdit]) -> Result<(), CoreError> {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.start());
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let a_end = (a.end_line, a.end_col);
        if b.start() < a_end {
            return Err(CoreError::InvalidOperation(format!(
                "overlapping text edits at line {}",
                b.start_line
            )));
        }
    }
    Ok(())
}

/// The pre-apply base of one targeted file: its content hash and whether
/// that content was sourced from a dirty editor buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBaseSignature {
    /// Target location.
    pub uri: WorkspaceUri,
    /// Hash of the normalized base content.
    pub content_hash: ContentHash,
    /// Whether the content came from an editor buffer rather than disk.
    pub is_dirty: bool,
}

/// The hash a targeted file's content is expected to have after apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFileResult {
    /// Target location.
    pub uri: WorkspaceUri,
    /// Hash of the normalized post-apply content.
    pub expected_content_hash: ContentHash,
}
