//! Query Engine (spec §4.7): candidate selection, composite pre-score,
//! BM25 rerank, optional hybrid blend, deadline-bounded top-k.

use crate::hybrid::{blend, cosine_similarity, normalize_bm25, HybridWeights};
use crate::model::{IndexEntry, InvertedIndexes, QueryHit, QueryMetrics, QueryResult};
use crate::scorer::{bm25_score, pre_score, DocStats, PreScoreWeights, ScorerContext};
use crate::services::EmbeddingService;
use crate::store::IndexStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The indexer's runtime state. Kept as two explicitly distinct values —
/// a config-level off switch and a self-triggered degradation — rather
/// than one boolean, since a host needs to tell "turned off" apart from
/// "turned itself off because queries got too slow."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerState {
    /// Serving queries normally.
    Enabled,
    /// `indexer.enabled = false`. Queries return empty results immediately.
    Disabled,
    /// Self-triggered after sustained high latency. Bypasses scoring
    /// until [`QueryEngine::clear_degraded`] is called after a rebuild.
    /// `since` records when the degradation was entered, for diagnostics.
    Degraded {
        /// When the rolling-latency ceiling was first breached.
        since: Instant,
    },
}

/// Tunables for [`QueryEngine`], mapped from the `indexer.*` config keys.
#[derive(Debug, Clone)]
pub struct QueryEngineConfig {
    /// Hard deadline for one query (`indexer.queryTimeoutMs`).
    pub timeout: Duration,
    /// Candidates scored per batch before the deadline is rechecked.
    pub batch_size: usize,
    /// Number of high-score candidates that triggers early termination.
    pub early_termination_count: usize,
    /// Pre-score value a candidate must reach to count toward
    /// `early_termination_count`.
    pub early_termination_score: f32,
    /// BM25/vector blend weights (`indexer.hybridWeights`).
    pub hybrid_weights: HybridWeights,
    /// Minimum pre-score a candidate needs to be scored at all.
    pub pre_score_threshold: f32,
    /// Maximum number of cached query results.
    pub cache_capacity: usize,
    /// How long a cached result stays valid.
    pub cache_ttl: Duration,
    /// Number of recent latencies averaged to decide degradation.
    pub degraded_window: usize,
    /// Rolling mean latency, in milliseconds, above which the engine
    /// self-degrades.
    pub degraded_latency_ceiling_ms: f64,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(150),
            batch_size: 64,
            early_termination_count: 20,
            early_termination_score: 50.0,
            hybrid_weights: HybridWeights::default(),
            pre_score_threshold: 0.5,
            cache_capacity: 256,
            cache_ttl: Duration::from_secs(30),
            degraded_window: 20,
            degraded_latency_ceiling_ms: 500.0,
        }
    }
}

struct CacheEntry {
    result: QueryResult,
    inserted_at: Instant,
}

/// A tiny LRU+TTL cache keyed on `(normalized query text, k)`.
struct Cache {
    capacity: usize,
    ttl: Duration,
    order: VecDeque<(String, usize)>,
    map: HashMap<(String, usize), CacheEntry>,
}

impl Cache {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            order: VecDeque::new(),
            map: HashMap::new(),
        }
    }

    fn get(&mut self, text: &str, k: usize) -> Option<QueryResult> {
        let key = (text.to_string(), k);
        let expired = match self.map.get(&key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            self.map.remove(&key);
            self.order.retain(|k2| k2 != &key);
            return None;
        }
        self.touch(&key);
        self.map.get(&key).map(|e| e.result.clone())
    }

    fn touch(&mut self, key: &(String, usize)) {
        self.order.retain(|k2| k2 != key);
        self.order.push_back(key.clone());
    }

    fn put(&mut self, text: String, k: usize, result: QueryResult) {
        let key = (text, k);
        self.map.insert(
            key.clone(),
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
        self.order.retain(|k2| k2 != &key);
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
    }
}

/// One scored slice of a candidate entry (the whole-file snippet, or a
/// single chunk), ready for BM25 and optional vector scoring. An entry
/// gated in by the file-level pre-score produces one `Candidate` per
/// slice; slices are deduplicated back down to one per URI only after
/// every slice has been fully scored.
struct Candidate {
    pos: usize,
    pre: f32,
    chunk_range: Option<(u32, u32)>,
    doc: DocStats,
    embedding: Option<Vec<f32>>,
}

/// Min-heap element for deadline-bounded top-k extraction. Ordering is
/// reversed so [`std::collections::BinaryHeap`] — a max-heap — keeps the
/// *lowest*-scoring retained item at the top, ready to evict.
struct HeapItem {
    hit: QueryHit,
    doc_len: u32,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.hit.score == other.hit.score
    }
}
impl Eq for HeapItem {}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.hit.score.total_cmp(&self.hit.score)
    }
}

/// Scores queries against an [`IndexStore`] snapshot, with caching,
/// deadline enforcement, and self-regulating degraded mode.
pub struct QueryEngine {
    config: QueryEngineConfig,
    embeddings: Option<Arc<dyn EmbeddingService>>,
    cache: Mutex<Cache>,
    state: Mutex<IndexerState>,
    latencies: Mutex<VecDeque<f64>>,
}

impl QueryEngine {
    /// Build an engine. `embeddings` is `None` for BM25-only hosts;
    /// `Some` enables hybrid blending whenever the service is enabled.
    pub fn new(config: QueryEngineConfig, embeddings: Option<Arc<dyn EmbeddingService>>) -> Self {
        let cache = Cache::new(config.cache_capacity, config.cache_ttl);
        Self {
            config,
            embeddings,
            cache: Mutex::new(cache),
            state: Mutex::new(IndexerState::Enabled),
            latencies: Mutex::new(VecDeque::new()),
        }
    }

    /// The indexer's current runtime state.
    pub fn state(&self) -> IndexerState {
        *self.state.lock()
    }

    /// Apply `indexer.enabled = false`.
    pub fn disable(&self) {
        *self.state.lock() = IndexerState::Disabled;
    }

    /// Apply `indexer.enabled = true`, clearing a config-level disable
    /// (but not a runtime degradation — that needs a rebuild).
    pub fn enable(&self) {
        let mut state = self.state.lock();
        if *state == IndexerState::Disabled {
            *state = IndexerState::Enabled;
        }
    }

    /// Clear a self-triggered degradation after a full rebuild. A no-op
    /// if the engine is merely config-disabled.
    pub fn clear_degraded(&self) {
        let mut state = self.state.lock();
        if matches!(*state, IndexerState::Degraded { .. }) {
            *state = IndexerState::Enabled;
        }
        self.latencies.lock().clear();
    }

    /// Run a query against `store`, returning ranked hits plus metrics.
    pub async fn query(&self, store: &IndexStore, text: &str, k: usize) -> QueryResult {
        let start = Instant::now();
        if self.state() != IndexerState::Enabled {
            return QueryResult::default();
        }

        let normalized = text.trim().to_lowercase();
        if let Some(cached) = self.cache.lock().get(&normalized, k) {
            return cached;
        }

        let result = self.execute(store, text, &normalized, k, start).await;
        self.cache.lock().put(normalized, k, result.clone());
        self.record_latency(result.metrics.retrieval_latency_ms);
        result
    }

    async fn execute(
        &self,
        store: &IndexStore,
        text: &str,
        normalized: &str,
        k: usize,
        start: Instant,
    ) -> QueryResult {
        let deadline = start + self.config.timeout;
        let query_tokens = crate::tokenizer::tokenize(text);
        let weights = PreScoreWeights::defaults();
        let candidates = select_candidates(store.indexes(), normalized, &query_tokens);

        let mut scored: Vec<Candidate> = Vec::new();
        let mut timed_out = false;
        let mut early_terminated = false;
        let mut high_score_count = 0usize;
        let ordered: Vec<usize> = candidates.into_iter().collect();

        'outer: for batch in ordered.chunks(self.config.batch_size.max(1)) {
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
            for &pos in batch {
                let Some(entry) = store.entries().get(pos) else {
                    continue;
                };
                let pre = pre_score(
                    &weights,
                    text,
                    &query_tokens,
                    &entry.symbols,
                    &entry.uri_tokens,
                    &entry.snippet,
                    &entry.snippet_tokens,
                );
                if pre < self.config.pre_score_threshold {
                    continue;
                }
                for (doc, chunk_range, embedding) in entry_slices(entry) {
                    scored.push(Candidate {
                        pos,
                        pre,
                        chunk_range,
                        doc,
                        embedding,
                    });
                }
                if pre >= self.config.early_termination_score {
                    high_score_count += 1;
                    if high_score_count >= self.config.early_termination_count {
                        early_terminated = true;
                        break 'outer;
                    }
                }
            }
        }

        let total_docs = scored.len().max(1);
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        for candidate in &scored {
            for term in candidate.doc.term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let avg_len = if scored.is_empty() {
            1.0
        } else {
            scored.iter().map(|c| c.doc.doc_len as f32).sum::<f32>() / scored.len() as f32
        };
        let mut ctx = ScorerContext::new(total_docs, doc_freqs, avg_len);

        let raw_scores: Vec<f32> = scored
            .iter()
            .map(|c| c.pre + bm25_score(&query_tokens, &c.doc, &mut ctx))
            .collect();
        let normalized_scores = normalize_bm25(&raw_scores);

        let mut embedding_latency_ms = None;
        let mut hybrid_used = false;
        let query_embedding = match &self.embeddings {
            Some(svc) if svc.is_enabled() && !timed_out => {
                let embed_start = Instant::now();
                let vectors = svc.embed(&[text.to_string()]).await;
                embedding_latency_ms = Some(embed_start.elapsed().as_secs_f64() * 1000.0);
                vectors.into_iter().next()
            }
            _ => None,
        };

        // Per-URI dedup (spec §4.7 step 6): every chunk of a gated-in entry
        // was scored individually above, so here we keep only the
        // highest-scoring slice per entry before it ever reaches the heap.
        let mut best_by_pos: HashMap<usize, HeapItem> = HashMap::new();
        for (i, candidate) in scored.iter().enumerate() {
            let vector_score = match (&query_embedding, &candidate.embedding) {
                (Some(q), Some(e)) => {
                    hybrid_used = true;
                    Some(cosine_similarity(q, e))
                }
                _ => None,
            };
            let score = blend(normalized_scores[i], vector_score, self.config.hybrid_weights);
            let entry = &store.entries()[candidate.pos];
            let item = HeapItem {
                hit: QueryHit {
                    uri: entry.uri.clone(),
                    chunk_line_range: candidate.chunk_range,
                    score,
                },
                doc_len: candidate.doc.doc_len,
            };
            best_by_pos
                .entry(candidate.pos)
                .and_modify(|existing| {
                    if item.hit.score > existing.hit.score {
                        *existing = HeapItem {
                            hit: item.hit.clone(),
                            doc_len: item.doc_len,
                        };
                    }
                })
                .or_insert(item);
        }

        let mut heap: std::collections::BinaryHeap<HeapItem> = std::collections::BinaryHeap::new();
        for item in best_by_pos.into_values() {
            if heap.len() < k {
                heap.push(item);
            } else if let Some(top) = heap.peek() {
                if item.hit.score > top.hit.score {
                    heap.pop();
                    heap.push(item);
                }
            }
        }

        let mut ranked: Vec<HeapItem> = heap.into_iter().collect();
        ranked.sort_by(|a, b| b.hit.score.total_cmp(&a.hit.score));
        let tokens_injected = ranked.iter().map(|h| h.doc_len as usize).sum();
        let top_score = ranked.first().map(|h| h.hit.score);
        let results: Vec<QueryHit> = ranked.into_iter().map(|h| h.hit).collect();

        QueryResult {
            metrics: QueryMetrics {
                retrieval_latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                tokens_injected,
                results_count: results.len(),
                top_score,
                timed_out,
                early_terminated,
                embedding_latency_ms,
                hybrid_search_used: hybrid_used,
            },
            results,
        }
    }

    fn record_latency(&self, latency_ms: f64) {
        let mut latencies = self.latencies.lock();
        latencies.push_back(latency_ms);
        while latencies.len() > self.config.degraded_window {
            latencies.pop_front();
        }
        if latencies.len() == self.config.degraded_window {
            let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
            if mean > self.config.degraded_latency_ceiling_ms {
                let mut state = self.state.lock();
                if *state == IndexerState::Enabled {
                    *state = IndexerState::Degraded {
                        since: Instant::now(),
                    };
                }
            }
        }
    }
}

/// Tokenize-and-consult candidate selection: intersect the `term` index
/// across every query token first; fall back to their union if the
/// intersection is empty. An exact lowercase match in the `symbol` index
/// is always folded in, so an exact symbol-name query never depends on
/// term-index tokenization lining up.
fn select_candidates(
    indexes: &InvertedIndexes,
    normalized_query: &str,
    query_tokens: &[String],
) -> HashSet<usize> {
    let mut out = HashSet::new();
    if let Some(set) = indexes.symbol.get(normalized_query) {
        out.extend(set.iter().copied());
    }
    if query_tokens.is_empty() {
        return out;
    }
    let sets: Vec<&HashSet<usize>> = query_tokens
        .iter()
        .filter_map(|t| indexes.term.get(t))
        .collect();
    if sets.is_empty() {
        return out;
    }
    let mut intersection = sets[0].clone();
    for set in &sets[1..] {
        intersection = intersection.intersection(set).cloned().collect();
    }
    if !intersection.is_empty() {
        out.extend(intersection);
    } else {
        for set in &sets {
            out.extend(set.iter().copied());
        }
    }
    out
}

/// Every scoreable slice of a gated-in entry: the whole-file snippet plus
/// each chunk, each carrying its own doc stats, line range (`None` for
/// the snippet), and embedding for hybrid blending. Every slice is
/// scored individually (spec §4.7 step 3) — raw token overlap never
/// pre-selects a single slice before BM25/hybrid scoring runs.
fn entry_slices(entry: &IndexEntry) -> Vec<(DocStats, Option<(u32, u32)>, Option<Vec<f32>>)> {
    let mut slices = Vec::with_capacity(1 + entry.chunks.len());
    slices.push((
        DocStats::from_tokens(&entry.snippet_tokens),
        None,
        entry.snippet_embedding.clone(),
    ));
    for chunk in &entry.chunks {
        slices.push((
            DocStats::from_tokens(&chunk.tokens),
            Some((chunk.start_line, chunk.end_line)),
            chunk.embedding.clone(),
        ));
    }
    slices
}
