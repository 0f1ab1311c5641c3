//! Shared types for codeforge: the edit-operation data model, a unified
//! error taxonomy, content hashing with line-ending normalization, and
//! the path-safety validators every edit/read tool is built on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod ops;
pub mod pathsafety;

pub use error::{ApplyErrorCategory, CoreError, Result};
pub use hash::{normalize_line_endings, ContentHash};
pub use ops::{
    validate_non_overlapping, ExpectedFileResult, FileBaseSignature, FileEditOperation, TextEdit,
};
pub use pathsafety::{validate_bool, validate_column, validate_line, validate_page, WorkspaceUri};
