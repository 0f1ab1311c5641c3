//! Filesystem and editor-buffer abstractions shared by the apply engine,
//! the durability layer, and the indexer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod inmemory;
pub mod real;
pub mod traits;

pub use inmemory::{InMemoryBufferSource, InMemoryFilesystem};
pub use real::{RealFilesystem, WatchHandle, BUILTIN_EXCLUDES};
pub use traits::{
    capture_source, BufferHandle, EditorBufferSource, FileChangeEvent, Filesystem, FsError,
    FsResult, Stat, WatchOptions,
};
