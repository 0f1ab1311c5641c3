//! Synthesizes expected post-apply content for create/full-edit/text-edit
//! operations, ahead of the write phase actually touching disk.

use codeforge_core::{ContentHash, FileEditOperation, TextEdit};

/// Computes the content an operation is expected to produce, given its
/// captured base. Used both to derive the expected hash checked in
/// post-verify and, for text-edit operations, to produce the literal
/// content written during the write phase.
pub struct ExpectedResultComputer;

impl ExpectedResultComputer {
    /// Compute the post-apply content for `op` given `base`, the
    /// (possibly absent) pre-apply content. `base` is `None` for creates
    /// and for edits targeting a file that doesn't exist yet.
    pub fn compute(op: &FileEditOperation, base: Option<&str>) -> String {
        match op {
            FileEditOperation::Create { content, .. } => content.clone(),
            FileEditOperation::Edit {
                content,
                text_edits,
                ..
            } => {
                if let Some(content) = content {
                    content.clone()
                } else {
                    let edits = text_edits.as_deref().unwrap_or(&[]);
                    apply_text_edits(base.unwrap_or(""), edits)
                }
            }
            FileEditOperation::Delete { .. } => String::new(),
        }
    }

    /// Compute the expected content hash for `op` given `base`.
    pub fn expected_hash(op: &FileEditOperation, base: Option<&str>) -> ContentHash {
        ContentHash::of(&Self::compute(op, base))
    }
}

/// Apply a set of 1-indexed, half-open-in-end-column text edits to
/// `base`, splicing from the last edit (by start position) to the first
/// so earlier offsets in the document stay valid.
///
/// An end column beyond the actual line length is clamped to the line's
/// length rather than treated as an error — the spec flags this as an
/// ambiguity inherited from the source it was distilled from, and elects
/// to clamp once, here, rather than at every caller.
pub fn apply_text_edits(base: &str, edits: &[TextEdit]) -> String {
    if edits.is_empty() {
        return base.to_string();
    }

    let mut lines: Vec<String> = base.split('\n').map(|l| l.to_string()).collect();
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.start().cmp(&a.start()));

    for edit in ordered {
        // 1-indexed in the wire format; 0-indexed into `lines`.
        let start_line = edit.start_line.saturating_sub(1) as usize;
        let end_line = edit.end_line.saturating_sub(1) as usize;
        if start_line >= lines.len() {
            continue;
        }
        let end_line = end_line.min(lines.len().saturating_sub(1));

        // 1-indexed, half-open end column: column c covers 0-indexed
        // position c-1, and the half-open upper bound already matches
        // Rust's exclusive slice convention once shifted by one.
        let start_col = (edit.start_col.saturating_sub(1) as usize).min(lines[start_line].len());
        let end_col = (edit.end_col.saturating_sub(1) as usize).min(lines[end_line].len());

        let prefix = lines[start_line][..start_col].to_string();
        let suffix = lines[end_line][end_col..].to_string();
        let replacement = format!("{prefix}{}{suffix}", edit.new_text);

        lines.splice(
            start_line..=end_line,
            replacement.split('\n').map(|l| l.to_string()),
        );
    }

    lines.join("\n")
}
