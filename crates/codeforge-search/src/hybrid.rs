//! Hybrid BM25/vector blend (spec §4.7 step 5).

/// The `{bm25, vector}` weight pair from `indexer.hybridWeights`. Must
/// sum to 1; [`HybridWeights::default`] is the spec's 0.6/0.4 split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    /// Weight applied to the normalized BM25 score.
    pub bm25: f32,
    /// Weight applied to cosine similarity against a query embedding.
    pub vector: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            bm25: 0.6,
            vector: 0.4,
        }
    }
}

impl HybridWeights {
    /// Construct a weight pair, normalizing so the two always sum to 1
    /// even if a misconfigured host supplies values that don't.
    pub fn new(bm25: f32, vector: f32) -> Self {
        let total = bm25 + vector;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            bm25: bm25 / total,
            vector: vector / total,
        }
    }
}

/// Cosine similarity between two equal-length dense vectors. Returns 0.0
/// for mismatched lengths or a zero-norm vector rather than panicking —
/// embeddings are host-supplied data, not an internal invariant.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Blend a normalized BM25 score with cosine similarity against a query
/// embedding, using `weights`. When no query embedding was computed
/// (embeddings disabled, offline, or this candidate has none), the blend
/// degrades to BM25-only by construction — callers pass `None` and get
/// `bm25_score * weights.bm25` scaled back up, preserving rank order
/// within a query relative to candidates that *do* have a vector score.
pub fn blend(bm25_normalized: f32, vector_score: Option<f32>, weights: HybridWeights) -> f32 {
    match vector_score {
        Some(vector) => weights.bm25 * bm25_normalized + weights.vector * vector,
        None => bm25_normalized,
    }
}

/// Normalize raw BM25 scores into `[0, 1]` by dividing by the maximum
/// observed score in the candidate set (min-max with an implicit floor
/// of 0, since BM25 scores are never negative for non-negative IDF).
pub fn normalize_bm25(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| s / max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = HybridWeights::default();
        assert!((w.bm25 + w.vector - 1.0).abs() < 1e-6);
        assert_eq!(w.bm25, 0.6);
        assert_eq!(w.vector, 0.4);
    }

    #[test]
    fn weights_normalize_when_misconfigured() {
        let w = HybridWeights::new(3.0, 1.0);
        assert!((w.bm25 - 0.75).abs() < 1e-6);
        assert!((w.vector - 0.25).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn blend_without_vector_falls_back_to_bm25() {
        let weights = HybridWeights::default();
        assert_eq!(blend(0.7, None, weights), 0.7);
    }

    #[test]
    fn blend_with_vector_applies_both_weights() {
        let weights = HybridWeights::default();
        let blended = blend(1.0, Some(1.0), weights);
        assert!((blended - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_bm25_scales_to_unit_max() {
        let normalized = normalize_bm25(&[2.0, 4.0, 1.0]);
        assert_eq!(normalized, vec![0.5, 1.0, 0.25]);
    }

    #[test]
    fn normalize_bm25_all_zero_stays_zero() {
        assert_eq!(normalize_bm25(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
