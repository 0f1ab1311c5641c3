//! External interfaces the builder consumes but does not own: secret
//! detection, the privacy/offline gate, and the embedding service
//! (spec §6, "External Interfaces (consumed)").
//!
//! Each trait has an in-memory/no-op test double alongside it, in the
//! same style as `codeforge_fs::traits`.

use async_trait::async_trait;

/// How the host's secret detector should react to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretDetectionMode {
    /// Reject the content outright (not used by the indexer, which only
    /// ever redacts before embedding, but part of the consumed contract).
    Block,
    /// Redact matches before the text is used.
    Redact,
    /// Detection is disabled; text passes through unchanged.
    Off,
}

/// One matched span the detector flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMatch {
    /// Byte offset of the match start in the input text.
    pub start: usize,
    /// Byte offset of the match end in the input text.
    pub end: usize,
    /// A short label for the kind of secret matched (detector-defined).
    pub kind: String,
}

/// The result of running `SecretDetector::detect` over a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDetection {
    /// Whether any match was found.
    pub has_secrets: bool,
    /// `text` with every match replaced by a redaction marker.
    pub redacted_text: String,
    /// The matches found, in order.
    pub matches: Vec<SecretMatch>,
}

/// Detects and redacts secret-shaped content before it is embedded.
pub trait SecretDetector: Send + Sync {
    /// Scan `text`, returning redacted text and match metadata.
    fn detect(&self, text: &str) -> SecretDetection;

    /// The detector's current mode, as configured by the host.
    fn mode(&self) -> SecretDetectionMode;
}

/// A detector with no patterns: nothing is ever flagged. Used by hosts
/// with `secretDetection.mode = "off"` and by tests that don't exercise
/// redaction.
pub struct NoopSecretDetector;

impl SecretDetector for NoopSecretDetector {
    fn detect(&self, text: &str) -> SecretDetection {
        SecretDetection {
            has_secrets: false,
            redacted_text: text.to_string(),
            matches: Vec::new(),
        }
    }

    fn mode(&self) -> SecretDetectionMode {
        SecretDetectionMode::Off
    }
}

/// A fixed-pattern detector for tests: flags any occurrence of a literal
/// substring, redacting it to `[REDACTED]`.
pub struct PatternSecretDetector {
    pattern: String,
}

impl PatternSecretDetector {
    /// Flag any occurrence of `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl SecretDetector for PatternSecretDetector {
    fn detect(&self, text: &str) -> SecretDetection {
        if self.pattern.is_empty() {
            return SecretDetection {
                has_secrets: false,
                redacted_text: text.to_string(),
                matches: Vec::new(),
            };
        }
        let mut matches = Vec::new();
        let mut search_from = 0;
        while let Some(pos) = text[search_from..].find(&self.pattern) {
            let start = search_from + pos;
            let end = start + self.pattern.len();
            matches.push(SecretMatch {
                start,
                end,
                kind: "pattern".to_string(),
            });
            search_from = end;
        }
        let redacted_text = text.replace(&self.pattern, "[REDACTED]");
        SecretDetection {
            has_secrets: !matches.is_empty(),
            redacted_text,
            matches,
        }
    }

    fn mode(&self) -> SecretDetectionMode {
        SecretDetectionMode::Redact
    }
}

/// Gates network-bound work (embeddings, web tools) behind the host's
/// privacy configuration.
pub trait PrivacyGate: Send + Sync {
    /// True when network-bound work must not run.
    fn is_offline(&self) -> bool;
}

/// A gate fixed at construction time, for tests and simple hosts.
pub struct StaticPrivacyGate(bool);

impl StaticPrivacyGate {
    /// Construct a gate that reports `offline` for every call.
    pub fn new(offline: bool) -> Self {
        Self(offline)
    }
}

impl PrivacyGate for StaticPrivacyGate {
    fn is_offline(&self) -> bool {
        self.0
    }
}

/// Computes dense embedding vectors for indexed text. Optional: the
/// indexer falls back to BM25-only scoring when disabled or offline.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Whether the service is currently available for use.
    fn is_enabled(&self) -> bool;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;
}

/// A disabled service: `is_enabled` is always false and `embed` is never
/// meant to be called.
pub struct DisabledEmbeddingService;

#[async_trait]
impl EmbeddingService for DisabledEmbeddingService {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn embed(&self, _texts: &[String]) -> Vec<Vec<f32>> {
        Vec::new()
    }
}

/// A deterministic fake for tests: produces a fixed-dimension vector by
/// hashing each token's bytes into a bucket, so texts sharing tokens
/// produce similar (not merely random) vectors.
pub struct FakeEmbeddingService {
    dim: usize,
}

impl FakeEmbeddingService {
    /// Construct a fake service producing `dim`-dimensional vectors.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbeddingService for FakeEmbeddingService {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0f32; self.dim];
                for token in crate::tokenizer::tokenize(text) {
                    let bucket = token.bytes().fold(0usize, |acc, b| {
                        (acc.wrapping_mul(31).wrapping_add(b as usize)) % self.dim
                    });
                    vec[bucket] += 1.0;
                }
                let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in &mut vec {
                        *v /= norm;
                    }
                }
                vec
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_detector_never_flags() {
        let det = NoopSecretDetector;
        let result = det.detect("sk-ant-REDACTED");
        assert!(!result.has_secrets);
        assert_eq!(result.redacted_text, "sk-ant-REDACTED");
    }

    #[test]
    fn pattern_detector_redacts_every_occurrence() {
        let det = PatternSecretDetector::new("TOKEN");
        let result = det.detect("a TOKEN and another TOKEN");
        assert!(result.has_secrets);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.redacted_text, "a [REDACTED] and another [REDACTED]");
    }

    #[tokio::test]
    async fn fake_embedding_service_shares_direction_for_shared_tokens() {
        let svc = FakeEmbeddingService::new(16);
        let vecs = svc
            .embed(&["fn parse_args".to_string(), "fn parse_args extra".to_string()])
            .await;
        let dot: f32 = vecs[0].iter().zip(&vecs[1]).map(|(a, b)| a * b).sum();
        assert!(dot > 0.3);
    }

    #[tokio::test]
    async fn disabled_embedding_service_reports_disabled() {
        let svc = DisabledEmbeddingService;
        assert!(!svc.is_enabled());
    }
}
