//! Symbol and import extraction (spec §4.5).
//!
//! The shipped extractor is the regex/character-window fallback tier: a
//! small syntactic detector per language family, not a full AST parser.
//! `Option<Box<dyn SymbolExtractor>>` is the extension point a host
//! embedding a real parser can fill in; nothing here assumes it's absent.

use once_cell::sync::Lazy;
use regex::Regex;

/// A chunk boundary an AST-aware extractor can propose. The
/// character-window fallback never produces these; [`crate::builder`]
/// falls back to its own windowing when a file yields none.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBoundary {
    /// 1-indexed inclusive start line.
    pub start_line: u32,
    /// 1-indexed inclusive end line.
    pub end_line: u32,
}

/// Extracts top-level symbol names, import statements, and (optionally)
/// AST-aligned chunk boundaries from a file's source text.
pub trait SymbolExtractor: Send + Sync {
    /// Deduplicated top-level symbol names declared in `text`.
    fn symbols(&self, text: &str) -> Vec<String>;

    /// `(imported_symbols, imported_from)` pairs parsed from `text`'s
    /// import/require-style statements, filtered to local/package-relative
    /// module paths.
    fn imports(&self, text: &str) -> (Vec<String>, Vec<String>);

    /// AST-aligned chunk boundaries, when this extractor can produce
    /// them. The fallback tier always returns `None`.
    fn chunk_boundaries(&self, _text: &str) -> Option<Vec<ChunkBoundary>> {
        None
    }
}

static SYMBOL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Rust / Go / Swift / C family: fn name(...)
        Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)")
            .unwrap(),
        // Rust struct/enum/trait, Go type, C struct
        Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|type)\s+([A-Za-z_][A-Za-z0-9_]*)")
            .unwrap(),
        // JS/TS/Java/C#/Kotlin class/interface
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:public\s+|private\s+)?(?:abstract\s+)?class\s+([A-Za-z_][A-Za-z0-9_]*)")
            .unwrap(),
        Regex::new(r"(?m)^\s*(?:export\s+)?interface\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
        // JS/TS function declarations and exported consts
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_][A-Za-z0-9_]*)")
            .unwrap(),
        // Python def/class
        Regex::new(r"(?m)^\s*def\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
        Regex::new(r"(?m)^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
    ]
});

static IMPORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // JS/TS: import { a, b } from './mod'
        Regex::new(r#"(?m)^\s*import\s+\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#).unwrap(),
        // JS/TS: import a from './mod'
        Regex::new(r#"(?m)^\s*import\s+([A-Za-z_][A-Za-z0-9_]*)\s+from\s*['"]([^'"]+)['"]"#)
            .unwrap(),
        // Python: from .mod import a, b
        Regex::new(r"(?m)^\s*from\s+(\.[A-Za-z0-9_.]*)\s+import\s+([A-Za-z0-9_, ]+)").unwrap(),
        // Rust: use crate::mod::{a, b};
        Regex::new(r"(?m)^\s*use\s+(crate|self|super)((?:::[A-Za-z0-9_]+)*)::\{?([A-Za-z0-9_, ]+)\}?;")
            .unwrap(),
    ]
});

/// True when `module_path` refers to the local workspace rather than an
/// external package (spec §4.5: "filtered to local and package‑relative").
fn is_local_module_path(module_path: &str) -> bool {
    module_path.starts_with('.')
        || module_path.starts_with('/')
        || matches!(module_path, "crate" | "self" | "super")
        || module_path.starts_with("crate::")
        || module_path.starts_with("self::")
        || module_path.starts_with("super::")
}

/// The regex/character-window fallback extractor (spec §4.5's "fallback"
/// tier). No AST parser is grounded in the corpus for this language set,
/// so this is what ships; an AST-backed extractor can be substituted via
/// the `Option<Box<dyn SymbolExtractor>>` extension point.
#[derive(Default)]
pub struct RegexSymbolExtractor;

impl SymbolExtractor for RegexSymbolExtractor {
    fn symbols(&self, text: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for pattern in SYMBOL_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let name = caps[1].to_string();
                if seen.insert(name.clone()) {
                    out.push(name);
                }
            }
        }
        out
    }

    fn imports(&self, text: &str) -> (Vec<String>, Vec<String>) {
        let mut symbols = Vec::new();
        let mut froms = Vec::new();
        for line_caps in IMPORT_PATTERNS[0].captures_iter(text) {
            let names = &line_caps[1];
            let from = &line_caps[2];
            for name in names.split(',') {
                let name = name.trim();
                if !name.is_empty() {
                    symbols.push(name.to_string());
                }
            }
            if is_local_module_path(from) {
                froms.push(from.to_string());
            }
        }
        for caps in IMPORT_PATTERNS[1].captures_iter(text) {
            symbols.push(caps[1].to_string());
            if is_local_module_path(&caps[2]) {
                froms.push(caps[2].to_string());
            }
        }
        for caps in IMPORT_PATTERNS[2].captures_iter(text) {
            let from = &caps[1];
            if is_local_module_path(from) {
                froms.push(from.to_string());
            }
            for name in caps[2].split(',') {
                let name = name.trim();
                if !name.is_empty() {
                    symbols.push(name.to_string());
                }
            }
        }
        for caps in IMPORT_PATTERNS[3].captures_iter(text) {
            let from = format!("{}{}", &caps[1], &caps[2]);
            froms.push(from);
            for name in caps[3].split(',') {
                let name = name.trim();
                if !name.is_empty() {
                    symbols.push(name.to_string());
                }
            }
        }
        symbols.sort();
        symbols.dedup();
        froms.sort();
        froms.dedup();
        (symbols, froms)
    }
}
