//! The indexer's data model: entries, chunks, inverted indexes, and
//! query/metrics shapes.

use codeforge_core::WorkspaceUri;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A sub-file slice scored independently of its parent entry. AST-aligned
/// when a [`crate::builder::SymbolExtractor`] supplies chunk boundaries;
/// otherwise an overlapping character window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexChunk {
    /// The chunk's raw text.
    pub text: String,
    /// 1-indexed inclusive start line.
    pub start_line: u32,
    /// 1-indexed inclusive end line.
    pub end_line: u32,
    /// Tokenization of `text`, computed once at build time.
    pub tokens: Vec<String>,
    /// Dense embedding vector, present only when the embedding service
    /// was enabled and this chunk was not redacted for secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// One file's indexed record. Entries form a strict tree with their
/// chunks — chunks never reference back to their entry by pointer, only
/// by the integer position `IndexStore` assigns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed file.
    pub uri: WorkspaceUri,
    /// Deduplicated top-level symbol names.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Leading excerpt, anchored on line boundaries.
    pub snippet: String,
    /// 1-indexed inclusive start line of `snippet`.
    pub snippet_start_line: u32,
    /// 1-indexed inclusive end line of `snippet`.
    pub snippet_end_line: u32,
    /// Sub-file chunks, capped at a small count per file.
    #[serde(default)]
    pub chunks: Vec<IndexChunk>,
    /// Tokenization of `snippet`, computed once at build time.
    #[serde(default)]
    pub snippet_tokens: Vec<String>,
    /// Tokenization of the file's URI path.
    #[serde(default)]
    pub uri_tokens: Vec<String>,
    /// Tokenization of `symbols`.
    #[serde(default)]
    pub symbol_tokens: Vec<String>,
    /// Symbols imported by this file (local names).
    #[serde(default)]
    pub imported_symbols: Vec<String>,
    /// Module paths imported symbols came from, filtered to
    /// local/package-relative paths.
    #[serde(default)]
    pub imported_from: Vec<String>,
    /// Embedding of `snippet`, same conditions as chunk embeddings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_embedding: Option<Vec<f32>>,
}

impl IndexEntry {
    /// Recompute any token fields missing after a legacy-format load,
    /// per the store's reader-tolerance contract.
    pub fn backfill_tokens(&mut self) {
        if self.snippet_tokens.is_empty() && !self.snippet.is_empty() {
            self.snippet_tokens = crate::tokenizer::tokenize(&self.snippet);
        }
        if self.uri_tokens.is_empty() {
            self.uri_tokens = crate::tokenizer::tokenize(self.uri.as_str());
        }
        if self.symbol_tokens.is_empty() && !self.symbols.is_empty() {
            self.symbol_tokens = crate::tokenizer::tokenize(&self.symbols.join(" "));
        }
        for chunk in &mut self.chunks {
            if chunk.tokens.is_empty() && !chunk.text.is_empty() {
                chunk.tokens = crate::tokenizer::tokenize(&chunk.text);
            }
        }
    }
}

/// The four primary inverted mappings plus the two auxiliary ones named
/// in the spec, all keyed by an entry's position in `IndexStore::entries`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndexes {
    /// term → entries containing it (snippet, chunk, or symbol tokens).
    pub term: HashMap<String, HashSet<usize>>,
    /// symbol → entries declaring it.
    pub symbol: HashMap<String, HashSet<usize>>,
    /// workspace-relative path → entry (at most one entry per path).
    pub path: HashMap<String, usize>,
    /// file extension → entries.
    pub extension: HashMap<String, HashSet<usize>>,
    /// path prefix (each ancestor directory) → entries, for hierarchical
    /// filtering.
    pub path_prefix: HashMap<String, HashSet<usize>>,
    /// imported symbol name → entries that import it.
    pub imported_symbol: HashMap<String, HashSet<usize>>,
}

/// A search request.
#[derive(Debug, Clone)]
pub struct Query {
    /// Raw query text.
    pub text: String,
    /// Maximum number of results to return.
    pub k: usize,
}

/// One scored result: a file, optionally narrowed to a specific chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    /// The matching file.
    pub uri: WorkspaceUri,
    /// Line range to cite, when the match was chunk-scoped.
    pub chunk_line_range: Option<(u32, u32)>,
    /// The final blended/reranked score.
    pub score: f32,
}

/// Diagnostics returned alongside a query's results.
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    /// Wall-clock time spent in `query`.
    pub retrieval_latency_ms: f64,
    /// Estimated tokens of context the results would inject.
    pub tokens_injected: usize,
    /// Number of results returned.
    pub results_count: usize,
    /// Highest score among the results, if any.
    pub top_score: Option<f32>,
    /// Whether the hard deadline was hit before scoring completed.
    pub timed_out: bool,
    /// Whether scoring stopped early because enough high-score
    /// candidates were already found.
    pub early_terminated: bool,
    /// Time spent computing a query embedding, if hybrid blending ran.
    pub embedding_latency_ms: Option<f64>,
    /// Whether the hybrid BM25/vector blend was used for this query.
    pub hybrid_search_used: bool,
}

/// The full result of a `query` call.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Ranked hits, at most one per URI.
    pub results: Vec<QueryHit>,
    /// Metrics describing how the result was produced.
    pub metrics: QueryMetrics,
}
