//! Hybrid BM25 + vector code-retrieval index: a workspace walker/builder,
//! a JSON-persisted store of entries and inverted indexes, a deadline-
//! bounded query engine, and a debounced incremental maintenance loop.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod extractor;
pub mod hybrid;
pub mod maintenance;
pub mod model;
pub mod query;
pub mod scorer;
pub mod services;
pub mod store;
pub mod tokenizer;

pub use builder::{BuilderConfig, IndexBuilder};
pub use extractor::{ChunkBoundary, RegexSymbolExtractor, SymbolExtractor};
pub use hybrid::{blend, cosine_similarity, normalize_bm25, HybridWeights};
pub use maintenance::{MaintenanceConfig, MaintenanceLoop};
pub use model::{
    IndexChunk, IndexEntry, InvertedIndexes, Query, QueryHit, QueryMetrics, QueryResult,
};
pub use query::{IndexerState, QueryEngine, QueryEngineConfig};
pub use scorer::{bm25_score, pre_score, BM25_B, BM25_K1, DocStats, PreScoreWeights, ScorerContext};
pub use services::{
    DisabledEmbeddingService, EmbeddingService, FakeEmbeddingService, NoopSecretDetector,
    PatternSecretDetector, PrivacyGate, SecretDetection, SecretDetectionMode, SecretDetector,
    SecretMatch, StaticPrivacyGate,
};
pub use store::{IndexStore, StoreError};
