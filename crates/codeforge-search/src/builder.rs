//! Indexer Builder (spec §4.5): walks the workspace and extracts one
//! [`IndexEntry`] per eligible file.

use crate::extractor::SymbolExtractor;
use crate::model::{IndexChunk, IndexEntry};
use crate::services::{EmbeddingService, PrivacyGate, SecretDetector};
use codeforge_core::WorkspaceUri;
use codeforge_fs::{Filesystem, BUILTIN_EXCLUDES};
use ignore::WalkBuilder;
use std::path::Path;
use std::sync::Arc;

/// Code extensions eligible for indexing, plus a small set of overview
/// documents (spec §4.5: "code extensions plus a small set of overview
/// documents").
const CODE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "kt", "swift", "c", "h", "cpp", "hpp",
    "cs", "rb", "php", "toml", "yaml", "yml", "json",
];

const OVERVIEW_FILENAMES: &[&str] = &["README.md", "readme.md", "OVERVIEW.md", "ARCHITECTURE.md"];

/// Snippet length for ordinary files; overview docs get a larger one.
const SNIPPET_LEN_CODE: usize = 400;
const SNIPPET_LEN_OVERVIEW: usize = 1200;

/// Character-window chunk size and overlap for files with no AST-aligned
/// chunk boundaries.
const CHUNK_LEN: usize = 400;
const CHUNK_OVERLAP: usize = 100;
const MAX_CHUNKS_PER_FILE: usize = 12;

/// Tunables for [`IndexBuilder`], mapped from `indexer.excludeGlobs`.
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// Additional glob exclusions layered on top of [`BUILTIN_EXCLUDES`].
    pub exclude_globs: Vec<String>,
}

/// Walks a workspace and produces [`IndexEntry`] values, extracting
/// symbols/imports via a pluggable [`SymbolExtractor`] and embeddings via
/// a pluggable [`EmbeddingService`], gated by a [`PrivacyGate`] and
/// redacted through a [`SecretDetector`] first.
pub struct IndexBuilder {
    fs: Arc<dyn Filesystem>,
    extractor: Box<dyn SymbolExtractor>,
    embeddings: Arc<dyn EmbeddingService>,
    secrets: Arc<dyn SecretDetector>,
    privacy: Arc<dyn PrivacyGate>,
    config: BuilderConfig,
}

impl IndexBuilder {
    /// Construct a builder over the given collaborators.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        extractor: Box<dyn SymbolExtractor>,
        embeddings: Arc<dyn EmbeddingService>,
        secrets: Arc<dyn SecretDetector>,
        privacy: Arc<dyn PrivacyGate>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            fs,
            extractor,
            embeddings,
            secrets,
            privacy,
            config,
        }
    }

    /// Walk `root`, returning one entry per eligible file. Files that
    /// fail to read (deleted mid-walk, non-UTF-8) are skipped, not
    /// fatal — spec §7's "indexer errors ... log and continue."
    pub async fn build_workspace(&self, root: &Path) -> Vec<IndexEntry> {
        let excludes = build_exclusion_matcher(&self.config.exclude_globs);
        let mut entries = Vec::new();
        let mut walker = WalkBuilder::new(root);
        walker.hidden(false).git_ignore(true).git_exclude(true);
        for result in walker.build() {
            let Ok(dir_entry) = result else { continue };
            let path = dir_entry.path();
            if excludes.is_match(path) {
                continue;
            }
            if !dir_entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if !is_eligible(path) {
                continue;
            }
            let Some(relative) = path.strip_prefix(root).ok().and_then(|p| p.to_str()) else {
                continue;
            };
            let Ok(uri) = WorkspaceUri::resolve(root, relative) else {
                continue;
            };
            let Ok(content) = self.fs.read_file(&uri).await else {
                continue;
            };
            entries.push(self.build_entry(uri, &content).await);
        }
        entries
    }

    /// Extract one entry's full record from its URI and content.
    pub async fn build_entry(&self, uri: WorkspaceUri, content: &str) -> IndexEntry {
        let is_overview = OVERVIEW_FILENAMES
            .iter()
            .any(|name| uri.as_str().ends_with(name));
        let snippet_len = if is_overview {
            SNIPPET_LEN_OVERVIEW
        } else {
            SNIPPET_LEN_CODE
        };

        let symbols = self.extractor.symbols(content);
        let (imported_symbols, imported_from) = self.extractor.imports(content);

        let (snippet, snippet_start_line, snippet_end_line) = take_snippet(content, snippet_len);
        let chunks = self.build_chunks(content);

        let mut entry = IndexEntry {
            uri,
            symbols,
            snippet,
            snippet_start_line,
            snippet_end_line,
            chunks,
            snippet_tokens: Vec::new(),
            uri_tokens: Vec::new(),
            symbol_tokens: Vec::new(),
            imported_symbols,
            imported_from,
            snippet_embedding: None,
        };
        entry.backfill_tokens();

        if self.embeddings.is_enabled() && !self.privacy.is_offline() {
            self.attach_embeddings(&mut entry).await;
        }

        entry
    }

    fn build_chunks(&self, content: &str) -> Vec<IndexChunk> {
        if let Some(boundaries) = self.extractor.chunk_boundaries(content) {
            let lines: Vec<&str> = content.lines().collect();
            return boundaries
                .into_iter()
                .take(MAX_CHUNKS_PER_FILE)
                .filter_map(|b| {
                    let start_idx = (b.start_line as usize).saturating_sub(1);
                    let end_idx = (b.end_line as usize).min(lines.len());
                    if start_idx >= end_idx {
                        return None;
                    }
                    let text = lines[start_idx..end_idx].join("\n");
                    let tokens = crate::tokenizer::tokenize(&text);
                    Some(IndexChunk {
                        text,
                        start_line: b.start_line,
                        end_line: b.end_line,
                        tokens,
                        embedding: None,
                    })
                })
                .collect();
        }
        character_window_chunks(content)
    }

    async fn attach_embeddings(&self, entry: &mut IndexEntry) {
        let mut texts = Vec::with_capacity(1 + entry.chunks.len());
        texts.push(redact_for_embedding(&entry.snippet, self.secrets.as_ref()));
        for chunk in &entry.chunks {
            texts.push(redact_for_embedding(&chunk.text, self.secrets.as_ref()));
        }
        let vectors = self.embeddings.embed(&texts).await;
        let mut iter = vectors.into_iter();
        entry.snippet_embedding = iter.next();
        for chunk in &mut entry.chunks {
            chunk.embedding = iter.next();
        }
    }
}

/// Redact `text` through the detector before it is handed to the
/// embedding service — spec §8's "no secrets embedded" property: the
/// detector's own output is what gets embedded, regardless of whether
/// it flagged anything.
fn redact_for_embedding(text: &str, detector: &dyn SecretDetector) -> String {
    detector.detect(text).redacted_text
}

fn is_eligible(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if OVERVIEW_FILENAMES.contains(&name) {
            return true;
        }
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext))
}

fn build_exclusion_matcher(extra: &[String]) -> globset::GlobSet {
    let mut builder = globset::GlobSetBuilder::new();
    for dir in BUILTIN_EXCLUDES {
        if let Ok(glob) = globset::Glob::new(&format!("**/{dir}/**")) {
            builder.add(glob);
        }
    }
    for pattern in extra {
        if let Ok(glob) = globset::Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| globset::GlobSet::empty())
}

/// Anchor the first `max_chars` on a line boundary, returning the
/// snippet plus its 1-indexed inclusive line range.
fn take_snippet(content: &str, max_chars: usize) -> (String, u32, u32) {
    if content.is_empty() {
        return (String::new(), 1, 1);
    }
    let mut taken = String::new();
    let mut end_line = 0u32;
    for (idx, line) in content.lines().enumerate() {
        if !taken.is_empty() && taken.len() + line.len() > max_chars {
            break;
        }
        if !taken.is_empty() {
            taken.push('\n');
        }
        taken.push_str(line);
        end_line = idx as u32 + 1;
        if taken.len() >= max_chars {
            break;
        }
    }
    if end_line == 0 {
        end_line = 1;
    }
    (taken, 1, end_line)
}

/// Overlapping ~`CHUNK_LEN`-character windows, each snapped to whole
/// lines, capped at [`MAX_CHUNKS_PER_FILE`].
fn character_window_chunks(content: &str) -> Vec<IndexChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut start_idx = 0usize;
    while start_idx < lines.len() && chunks.len() < MAX_CHUNKS_PER_FILE {
        let mut end_idx = start_idx;
        let mut len = 0usize;
        while end_idx < lines.len() && len < CHUNK_LEN {
            len += lines[end_idx].len() + 1;
            end_idx += 1;
        }
        let text = lines[start_idx..end_idx].join("\n");
        let tokens = crate::tokenizer::tokenize(&text);
        chunks.push(IndexChunk {
            text,
            start_line: start_idx as u32 + 1,
            end_line: end_idx as u32,
            tokens,
            embedding: None,
        });
        if end_idx >= lines.len() {
            break;
        }
        // Step back by the overlap, measured in lines rather than chars
        // (good enough given the fallback tier has no token-exact need).
        let mut overlap_lines = 0usize;
        let mut overlap_len = 0usize;
        while overlap_lines + 1 < end_idx - start_idx && overlap_len < CHUNK_OVERLAP {
            overlap_lines += 1;
            overlap_len += lines[end_idx - overlap_lines].len() + 1;
        }
        let next_start = end_idx - overlap_lines;
        // Guarantee forward progress even if a single oversized line
        // would otherwise leave start_idx unchanged.
        start_idx = next_start.max(start_idx + 1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::RegexSymbolExtractor;
    use crate::services::{DisabledEmbeddingService, FakeEmbeddingService, NoopSecretDetector, PatternSecretDetector, StaticPrivacyGate};
    use codeforge_fs::InMemoryFilesystem;

    fn builder(embeddings: Arc<dyn EmbeddingService>, privacy_offline: bool) -> IndexBuilder {
        IndexBuilder::new(
            Arc::new(InMemoryFilesystem::new(Path::new("/ws"))),
            Box::new(RegexSymbolExtractor),
            embeddings,
            Arc::new(NoopSecretDetector),
            Arc::new(StaticPrivacyGate::new(privacy_offline)),
            BuilderConfig::default(),
        )
    }

    #[tokio::test]
    async fn build_entry_extracts_symbols_and_snippet() {
        let b = builder(Arc::new(DisabledEmbeddingService), false);
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "src/lib.rs").unwrap();
        let content = "pub fn parse() {}\nstruct Thing;\n";
        let entry = b.build_entry(uri, content).await;
        assert!(entry.symbols.contains(&"parse".to_string()));
        assert!(entry.symbols.contains(&"Thing".to_string()));
        assert_eq!(entry.snippet, content.trim_end_matches('\n'));
        assert!(entry.snippet_embedding.is_none());
    }

    #[tokio::test]
    async fn disabled_embeddings_leave_vectors_empty() {
        let b = builder(Arc::new(DisabledEmbeddingService), false);
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        let entry = b.build_entry(uri, "fn a() {}").await;
        assert!(entry.snippet_embedding.is_none());
    }

    #[tokio::test]
    async fn offline_gate_suppresses_embeddings_even_when_enabled() {
        let b = builder(Arc::new(FakeEmbeddingService::new(8)), true);
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        let entry = b.build_entry(uri, "fn a() {}").await;
        assert!(entry.snippet_embedding.is_none());
    }

    #[tokio::test]
    async fn enabled_embeddings_populate_snippet_and_chunk_vectors() {
        let b = builder(Arc::new(FakeEmbeddingService::new(8)), false);
        let uri = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        let entry = b.build_entry(uri, "fn a() {}\nfn b() {}\n").await;
        assert!(entry.snippet_embedding.is_some());
    }

    #[tokio::test]
    async fn secret_flagged_text_embeds_the_redacted_form() {
        let fs = Arc::new(InMemoryFilesystem::new(Path::new("/ws")));
        let b = IndexBuilder::new(
            fs,
            Box::new(RegexSymbolExtractor),
            Arc::new(FakeEmbeddingService::new(8)),
            Arc::new(PatternSecretDetector::new("hunter2")),
            Arc::new(StaticPrivacyGate::new(false)),
            BuilderConfig::default(),
        );
        let with_secret = "let pw = \"hunter2\"; fn a() {}".to_string();
        let redacted_equivalent = "let pw = \"[REDACTED]\"; fn a() {}".to_string();

        let uri_a = WorkspaceUri::resolve(Path::new("/ws"), "a.rs").unwrap();
        let uri_b = WorkspaceUri::resolve(Path::new("/ws"), "b.rs").unwrap();
        let entry_a = b.build_entry(uri_a, &with_secret).await;
        let entry_b = b.build_entry(uri_b, &redacted_equivalent).await;
        assert_eq!(entry_a.snippet_embedding, entry_b.snippet_embedding);
    }

    #[test]
    fn take_snippet_anchors_on_line_boundaries() {
        let (snippet, start, end) = take_snippet("line one\nline two\nline three", 12);
        assert_eq!(snippet, "line one");
        assert_eq!((start, end), (1, 1));
    }

    #[test]
    fn character_window_chunks_cover_whole_file() {
        let content = (0..50)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = character_window_chunks(&content);
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= MAX_CHUNKS_PER_FILE);
        assert_eq!(chunks.last().unwrap().end_line as usize, 50);
    }

    #[test]
    fn is_eligible_accepts_code_extensions_and_readme() {
        assert!(is_eligible(Path::new("/ws/src/lib.rs")));
        assert!(is_eligible(Path::new("/ws/README.md")));
        assert!(!is_eligible(Path::new("/ws/image.png")));
    }
}
