//! Composite pre-score and BM25 reranking (spec §4.7 steps 3-4).

use std::collections::HashMap;

/// k1 term-frequency saturation parameter, fixed per spec §4.7.
pub const BM25_K1: f32 = 1.2;
/// b length-normalization parameter, fixed per spec §4.7.
pub const BM25_B: f32 = 0.75;

/// Corpus-level statistics needed for BM25, built once per query over
/// the candidate set (IDF is computed lazily and cached per term).
#[derive(Debug, Clone)]
pub struct ScorerContext {
    total_docs: usize,
    doc_freqs: HashMap<String, usize>,
    avg_doc_len: f32,
    idf_cache: HashMap<String, f32>,
}

impl ScorerContext {
    /// Build a context from the candidate set's document frequencies and
    /// average token-length.
    pub fn new(total_docs: usize, doc_freqs: HashMap<String, usize>, avg_doc_len: f32) -> Self {
        Self {
            total_docs,
            doc_freqs,
            avg_doc_len: avg_doc_len.max(1.0),
            idf_cache: HashMap::new(),
        }
    }

    /// IDF with the standard BM25 smoothing term, cached per term.
    ///
    /// `IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)`
    pub fn idf(&mut self, term: &str) -> f32 {
        if let Some(&cached) = self.idf_cache.get(term) {
            return cached;
        }
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        let n = self.total_docs as f32;
        let value = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        self.idf_cache.insert(term.to_string(), value);
        value
    }

    /// Average candidate length, floored at 1 to avoid division by zero.
    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }
}

/// Per-term counts for one document, computed once and reused across a
/// query's scoring and reranking passes.
#[derive(Debug, Clone)]
pub struct DocStats {
    /// Term -> occurrence count within this document's token set.
    pub term_freqs: HashMap<String, u32>,
    /// Total token count.
    pub doc_len: u32,
}

impl DocStats {
    /// Compute term frequencies from a pre-tokenized document.
    pub fn from_tokens(tokens: &[String]) -> Self {
        let mut term_freqs = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token.clone()).or_insert(0u32) += 1;
        }
        Self {
            term_freqs,
            doc_len: tokens.len() as u32,
        }
    }
}

/// BM25 score of `query_terms` against `doc`, using `ctx`'s cached IDF.
pub fn bm25_score(query_terms: &[String], doc: &DocStats, ctx: &mut ScorerContext) -> f32 {
    if query_terms.is_empty() || doc.doc_len == 0 {
        return 0.0;
    }
    let avg_len = ctx.avg_doc_len();
    let doc_len = doc.doc_len as f32;
    let mut score = 0.0;
    for term in query_terms {
        let tf = doc.term_freqs.get(term).copied().unwrap_or(0) as f32;
        if tf == 0.0 {
            continue;
        }
        let idf = ctx.idf(term);
        let numerator = tf * (BM25_K1 + 1.0);
        let denominator = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len);
        score += idf * (numerator / denominator);
    }
    score
}

/// Composite pre-score signals (spec §4.7 step 3), checked in descending
/// order of importance: exact symbol match dominates, down to a weak
/// phrase-occurrence signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreScoreWeights {
    /// Weight for an exact (case-insensitive) symbol name match.
    pub exact_symbol: f32,
    /// Weight for a symbol name containing the query as a substring.
    pub substring_symbol: f32,
    /// Weight per overlapping token between the query and the URI path.
    pub uri_token_overlap: f32,
    /// Weight per overlapping token between the query and the snippet.
    pub snippet_token_overlap: f32,
    /// Weight for the full, untokenized query appearing verbatim.
    pub phrase_occurrence: f32,
}

impl PreScoreWeights {
    /// Defaults chosen so each tier dominates the one below it for the
    /// typical small-corpus candidate counts this indexer handles.
    pub fn defaults() -> Self {
        Self {
            exact_symbol: 100.0,
            substring_symbol: 20.0,
            uri_token_overlap: 3.0,
            snippet_token_overlap: 1.0,
            phrase_occurrence: 5.0,
        }
    }
}

/// Compute the composite pre-score for one candidate entry.
#[allow(clippy::too_many_arguments)]
pub fn pre_score(
    weights: &PreScoreWeights,
    query_text: &str,
    query_tokens: &[String],
    symbols: &[String],
    uri_tokens: &[String],
    snippet: &str,
    snippet_tokens: &[String],
) -> f32 {
    let query_lower = query_text.to_lowercase();
    let mut score = 0.0;

    let mut has_exact = false;
    let mut has_substring = false;
    for symbol in symbols {
        let symbol_lower = symbol.to_lowercase();
        if symbol_lower == query_lower {
            has_exact = true;
        } else if symbol_lower.contains(&query_lower) {
            has_substring = true;
        }
    }
    if has_exact {
        score += weights.exact_symbol;
    } else if has_substring {
        score += weights.substring_symbol;
    }

    let uri_overlap = query_tokens
        .iter()
        .filter(|t| uri_tokens.contains(t))
        .count();
    score += uri_overlap as f32 * weights.uri_token_overlap;

    let snippet_overlap = query_tokens
        .iter()
        .filter(|t| snippet_tokens.contains(t))
        .count();
    score += snippet_overlap as f32 * weights.snippet_token_overlap;

    if !query_lower.is_empty() && snippet.to_lowercase().contains(&query_lower) {
        score += weights.phrase_occurrence;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_cached_and_higher_for_rare_terms() {
        let mut freqs = HashMap::new();
        freqs.insert("common".to_string(), 50);
        freqs.insert("rare".to_string(), 1);
        let mut ctx = ScorerContext::new(100, freqs, 10.0);
        let rare = ctx.idf("rare");
        let common = ctx.idf("common");
        assert!(rare > common);
        assert_eq!(ctx.idf("rare"), rare);
    }

    #[test]
    fn bm25_score_zero_for_no_overlap() {
        let doc = DocStats::from_tokens(&["hello".into(), "world".into()]);
        let mut ctx = ScorerContext::new(10, HashMap::new(), 2.0);
        assert_eq!(bm25_score(&["banana".into()], &doc, &mut ctx), 0.0);
    }

    #[test]
    fn bm25_score_positive_for_overlap() {
        let doc = DocStats::from_tokens(&["parse".into(), "args".into(), "parse".into()]);
        let mut freqs = HashMap::new();
        freqs.insert("parse".to_string(), 5);
        let mut ctx = ScorerContext::new(20, freqs, 3.0);
        let score = bm25_score(&["parse".into()], &doc, &mut ctx);
        assert!(score > 0.0);
    }

    #[test]
    fn pre_score_ranks_exact_symbol_above_substring_above_overlap() {
        let weights = PreScoreWeights::defaults();
        let query_tokens = vec!["parse".to_string()];
        let exact = pre_score(
            &weights,
            "parse",
            &query_tokens,
            &["parse".to_string()],
            &[],
            "",
            &[],
        );
        let substring = pre_score(
            &weights,
            "parse",
            &query_tokens,
            &["parse_args".to_string()],
            &[],
            "",
            &[],
        );
        let overlap_only = pre_score(
            &weights,
            "parse",
            &query_tokens,
            &[],
            &["parse".to_string()],
            "",
            &[],
        );
        assert!(exact > substring);
        assert!(substring > overlap_only);
    }
}
