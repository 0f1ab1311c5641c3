//! Indexer Store (spec §4.6): entries plus inverted indexes, persisted as
//! a single compacted JSON document per workspace.

use crate::model::{IndexEntry, InvertedIndexes};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current on-disk schema version. Bumped only if a future field
/// reshuffle can't be expressed as an `Option`/`#[serde(default)]`.
const STORE_VERSION: u32 = 1;

/// Errors surfaced by store persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure reading or writing the index blob.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The on-disk document was not valid JSON, or failed shape
    /// validation after parsing.
    #[error("invalid index document: {0}")]
    InvalidDocument(String),
}

/// The on-disk shape of the index blob. Older documents missing
/// `version` or any of the token arrays still deserialize — defaults
/// kick in and [`IndexEntry::backfill_tokens`] recomputes what's
/// missing (spec §6: "reader tolerates legacy fields and missing token
/// arrays").
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedDocument {
    #[serde(default = "default_version")]
    version: u32,
    entries: Vec<IndexEntry>,
}

fn default_version() -> u32 {
    0
}

/// Holds the indexer's in-memory state: the entry list plus every
/// inverted index derived from it. Indexes are rebuilt from `entries` on
/// load rather than persisted directly, so a corrupt index (but valid
/// entries) self-heals on the next `load`.
pub struct IndexStore {
    entries: Vec<IndexEntry>,
    indexes: InvertedIndexes,
    path: PathBuf,
}

impl IndexStore {
    /// An empty store rooted at `path` (not yet persisted).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Vec::new(),
            indexes: InvertedIndexes::default(),
            path: path.into(),
        }
    }

    /// Load from `path` if it exists; otherwise start empty. A legacy
    /// document (missing `version`, or found at `legacy_path`) is
    /// migrated forward and rewritten at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self::new(&path);
        if path.exists() {
            store.load_from(&path)?;
        }
        Ok(store)
    }

    fn load_from(&mut self, path: &Path) -> Result<(), StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let doc: PersistedDocument = serde_json::from_str(&raw)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let mut entries = doc.entries;
        for entry in &mut entries {
            entry.backfill_tokens();
        }
        self.entries = entries;
        self.rebuild_indexes();
        Ok(())
    }

    /// Read a legacy in-workspace index file, rewrite it at this store's
    /// own path, and delete the legacy file. A no-op if the legacy path
    /// doesn't exist or this store's path is already populated.
    pub fn migrate_legacy_location(&mut self, legacy_path: &Path) -> Result<bool, StoreError> {
        if !legacy_path.exists() || self.path.exists() {
            return Ok(false);
        }
        self.load_from(legacy_path)?;
        self.persist()?;
        let _ = std::fs::remove_file(legacy_path);
        tracing::info!(
            from = %legacy_path.display(),
            to = %self.path.display(),
            "migrated legacy index location"
        );
        Ok(true)
    }

    /// Persist the current entry set as a compacted JSON document.
    pub fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let doc = PersistedDocument {
            version: STORE_VERSION,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&doc)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Replace the entire entry set (used by a full rebuild) and rebuild
    /// every inverted index from scratch.
    pub fn replace_all(&mut self, entries: Vec<IndexEntry>) {
        self.entries = entries;
        self.rebuild_indexes();
    }

    /// Insert or replace the entry for `entry`'s URI, updating every
    /// inverted index incrementally rather than rebuilding from scratch.
    pub fn upsert(&mut self, entry: IndexEntry) {
        if let Some(&pos) = self.indexes.path.get(entry.uri.as_str()) {
            self.remove_index_references(pos);
            self.entries[pos] = entry;
            self.add_index_references(pos);
        } else {
            let pos = self.entries.len();
            self.entries.push(entry);
            self.add_index_references(pos);
        }
    }

    /// Remove the entry for `uri`, if present, updating every inverted
    /// index. Returns whether an entry was actually removed.
    pub fn remove(&mut self, uri_str: &str) -> bool {
        let Some(pos) = self.indexes.path.get(uri_str).copied() else {
            return false;
        };
        self.remove_index_references(pos);
        self.entries.remove(pos);
        self.indexes.path.remove(uri_str);
        // Every index position after `pos` shifted down by one.
        self.rebuild_indexes();
        true
    }

    /// Borrow the full entry slice (for the query engine's candidate
    /// scan).
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Borrow the inverted indexes (for candidate selection).
    pub fn indexes(&self) -> &InvertedIndexes {
        &self.indexes
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rebuild_indexes(&mut self) {
        self.indexes = InvertedIndexes::default();
        for pos in 0..self.entries.len() {
            self.add_index_references(pos);
        }
    }

    fn add_index_references(&mut self, pos: usize) {
        let entry = &self.entries[pos];
        for term in entry
            .snippet_tokens
            .iter()
            .chain(entry.symbol_tokens.iter())
            .chain(entry.chunks.iter().flat_map(|c| c.tokens.iter()))
        {
            self.indexes.term.entry(term.clone()).or_default().insert(pos);
        }
        for symbol in &entry.symbols {
            self.indexes
                .symbol
                .entry(symbol.to_lowercase())
                .or_default()
                .insert(pos);
        }
        self.indexes.path.insert(entry.uri.as_str().to_string(), pos);
        if let Some(ext) = entry.uri.as_str().rsplit('.').next() {
            self.indexes
                .extension
                .entry(ext.to_lowercase())
                .or_default()
                .insert(pos);
        }
        for ancestor in path_prefixes(entry.uri.as_str()) {
            self.indexes.path_prefix.entry(ancestor).or_default().insert(pos);
        }
        for symbol in &entry.imported_symbols {
            self.indexes
                .imported_symbol
                .entry(symbol.to_lowercase())
                .or_default()
                .insert(pos);
        }
    }

    fn remove_index_references(&mut self, pos: usize) {
        for set in self.indexes.term.values_mut() {
            set.remove(&pos);
        }
        for set in self.indexes.symbol.values_mut() {
            set.remove(&pos);
        }
        for set in self.indexes.extension.values_mut() {
            set.remove(&pos);
        }
        for set in self.indexes.path_prefix.values_mut() {
            set.remove(&pos);
        }
        for set in self.indexes.imported_symbol.values_mut() {
            set.remove(&pos);
        }
    }
}

fn path_prefixes(uri: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut acc = String::new();
    for segment in uri.split('/').collect::<Vec<_>>().split_last().map(|(_, rest)| rest).unwrap_or(&[]) {
        if !acc.is_empty() {
            acc.push('/');
        }
        acc.push_str(segment);
        out.push(acc.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeforge_core::WorkspaceUri;

    fn entry(path: &str, symbol: &str) -> IndexEntry {
        let mut e = IndexEntry {
            uri: WorkspaceUri::resolve(Path::new("/ws"), path).unwrap(),
            symbols: vec![symbol.to_string()],
            snippet: format!("fn {symbol}() {{}}"),
            snippet_start_line: 1,
            snippet_end_line: 1,
            chunks: Vec::new(),
            snippet_tokens: Vec::new(),
            uri_tokens: Vec::new(),
            symbol_tokens: Vec::new(),
            imported_symbols: Vec::new(),
            imported_from: Vec::new(),
            snippet_embedding: None,
        };
        e.backfill_tokens();
        e
    }

    #[test]
    fn upsert_then_query_index_finds_symbol() {
        let mut store = IndexStore::new("/tmp/does-not-matter.json");
        store.upsert(entry("src/a.rs", "parse_args"));
        assert!(store.indexes().symbol.contains_key("parse_args"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_clears_every_index_reference() {
        let mut store = IndexStore::new("/tmp/does-not-matter2.json");
        store.upsert(entry("src/a.rs", "parse_args"));
        assert!(store.remove("src/a.rs"));
        assert!(store.is_empty());
        assert!(!store.indexes().symbol.contains_key("parse_args"));
        assert!(!store.indexes().path.contains_key("src/a.rs"));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut store = IndexStore::new(&path);
        store.upsert(entry("src/a.rs", "parse_args"));
        store.persist().unwrap();

        let loaded = IndexStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.indexes().symbol.contains_key("parse_args"));
    }

    #[test]
    fn load_recomputes_missing_token_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let legacy_json = r#"{"entries":[{"uri":"src/a.rs","snippet":"fn parse_args() {}","snippet_start_line":1,"snippet_end_line":1}]}"#;
        std::fs::write(&path, legacy_json).unwrap();

        let loaded = IndexStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!loaded.entries()[0].snippet_tokens.is_empty());
    }

    #[test]
    fn migrate_legacy_location_moves_file_and_deletes_original() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_path = dir.path().join("legacy.json");
        let new_path = dir.path().join("new.json");
        std::fs::write(
            &legacy_path,
            r#"{"version":1,"entries":[{"uri":"a.rs","snippet":"x","snippet_start_line":1,"snippet_end_line":1,"snippet_tokens":["x"]}]}"#,
        )
        .unwrap();

        let mut store = IndexStore::new(&new_path);
        let migrated = store.migrate_legacy_location(&legacy_path).unwrap();
        assert!(migrated);
        assert!(new_path.exists());
        assert!(!legacy_path.exists());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn path_prefix_index_covers_every_ancestor_directory() {
        let mut store = IndexStore::new("/tmp/does-not-matter3.json");
        store.upsert(entry("src/nested/deep/a.rs", "x"));
        assert!(store.indexes().path_prefix.contains_key("src"));
        assert!(store.indexes().path_prefix.contains_key("src/nested"));
        assert!(store.indexes().path_prefix.contains_key("src/nested/deep"));
    }
}
