//! Workspace configuration (spec §6): exactly the option set named
//! there, nothing else. Deserialized from an optional TOML file at
//! `<workspace>/.codeforge/config.toml`, falling back to `Default`.

use codeforge_durability::StashMode;
use codeforge_search::{HybridWeights, SecretDetectionMode};
use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section has a `Default` matching the
/// defaults named in `spec.md`, so a workspace with no config file on
/// disk still runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeforgeConfig {
    /// `applyEngine.*`.
    pub apply_engine: ApplyEngineConfig,
    /// `indexer.*`.
    pub indexer: IndexerConfig,
    /// `secretDetection.*`.
    pub secret_detection: SecretDetectionConfig,
    /// `privacy.*`.
    pub privacy: PrivacyConfig,
}

impl Default for CodeforgeConfig {
    fn default() -> Self {
        Self {
            apply_engine: ApplyEngineConfig::default(),
            indexer: IndexerConfig::default(),
            secret_detection: SecretDetectionConfig::default(),
            privacy: PrivacyConfig::default(),
        }
    }
}

impl CodeforgeConfig {
    /// Parse from TOML text. Missing sections/fields fall back to their
    /// defaults rather than erroring, per `serde(default)`.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// `applyEngine.*` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyEngineConfig {
    /// Cap, in bytes, for one transaction's Snapshot Store capture.
    /// Above this the store returns `Skipped` and the apply engine
    /// falls back to a VCS stash.
    pub snapshot_max_bytes: u64,
    /// When to create a VCS stash ahead of an apply.
    pub git_auto_stash_mode: StashMode,
}

impl Default for ApplyEngineConfig {
    fn default() -> Self {
        Self {
            snapshot_max_bytes: 5 * 1024 * 1024,
            git_auto_stash_mode: StashMode::DirtyOnly,
        }
    }
}

/// `indexer.*` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexerConfig {
    /// Master on/off switch. `false` maps to `IndexerState::Disabled`
    /// and is distinct from the runtime `Degraded` self-disable.
    pub enabled: bool,
    /// Fraction of one core the maintenance loop's refresh pass may
    /// consume before yielding.
    pub cpu_budget: f64,
    /// Number of dirty URIs refreshed concurrently per maintenance pass.
    pub parallelism: usize,
    /// Hard deadline, in milliseconds, for one `query` call.
    pub query_timeout_ms: u64,
    /// BM25/vector blend weights for the optional hybrid rerank.
    pub hybrid_weights: (f32, f32),
    /// Extra glob exclusions layered on top of the built-in ones.
    pub exclude_globs: Vec<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_budget: 0.2,
            parallelism: 2,
            query_timeout_ms: 150,
            hybrid_weights: (0.6, 0.4),
            exclude_globs: Vec::new(),
        }
    }
}

impl IndexerConfig {
    pub(crate) fn resolved_hybrid_weights(&self) -> HybridWeights {
        HybridWeights {
            bm25: self.hybrid_weights.0,
            vector: self.hybrid_weights.1,
        }
    }
}

/// `secretDetection.*` (spec §6). The detector implementation itself is
/// a consumed external interface (spec §6.1/§6.3) supplied by the host;
/// this only records which mode the host asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretDetectionConfig {
    /// How the host's secret detector should react to a match.
    pub mode: SecretDetectionMode,
}

impl Default for SecretDetectionConfig {
    fn default() -> Self {
        Self {
            mode: SecretDetectionMode::Redact,
        }
    }
}

/// `privacy.*` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacyConfig {
    /// When true, network-bound work (embeddings) must not run.
    pub offline: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self { offline: false }
    }
}
