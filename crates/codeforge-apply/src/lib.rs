//! The atomic, verifying multi-file apply transaction engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod textedit;
pub mod transaction;

pub use textedit::{apply_text_edits, ExpectedResultComputer};
pub use transaction::{
    ApplyEngine, ApplyOptions, ApplyOutcome, RawOperation, TransactionState,
};
