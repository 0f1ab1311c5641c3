//! Content hashing with line-ending normalization.
//!
//! Every hash the Apply Engine compares (base signatures, expected
//! results, post-verify) goes through [`normalize_line_endings`] first,
//! so files that differ only in CRLF/CR/LF produce identical hashes.

use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest over line-ending-normalized content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash `content` after normalizing CRLF and lone CR to LF.
    pub fn of(content: &str) -> Self {
        let normalized = normalize_line_endings(content);
        Self::of_bytes(normalized.as_bytes())
    }

    /// Hash raw bytes with no normalization. Used internally once content
    /// has already been normalized, to avoid normalizing twice.
    fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        ContentHash(out)
    }

    /// Render as lowercase hex, for audit logs and persisted indexes.
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Normalize CRLF and lone CR to LF, leaving bare LF untouched.
///
/// This is the single normalization point every base signature, expected
/// result and post-verify hash must pass through so that line-ending
/// drift alone never registers as a content change.
pub fn normalize_line_endings(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_and_lf_hash_equal() {
        let crlf = "L1\r\nL2\r\n";
        let lf = "L1\nL2\n";
        assert_eq!(ContentHash::of(crlf), ContentHash::of(lf));
    }

    #[test]
    fn lone_cr_normalizes_to_lf() {
        let cr_only = "L1\rL2\r";
        let lf = "L1\nL2\n";
        assert_eq!(ContentHash::of(cr_only), ContentHash::of(lf));
    }

    #[test]
    fn different_content_hashes_differ() {
        assert_ne!(ContentHash::of("a"), ContentHash::of("b"));
    }

    #[test]
    fn hex_round_trips_through_display() {
        let h = ContentHash::of("hello world");
        assert_eq!(h.to_hex().len(), 64);
        assert_eq!(h.to_string(), h.to_hex());
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_line_endings("a\r\nb\rc\n");
        let twice = normalize_line_endings(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "a\nb\nc\n");
    }
}
