//! In-memory keyword index over chunked markdown documents.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use shrink_core::config::KnowledgeConfig;

use crate::chunker::split_text;
use crate::error::KnowledgeError;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for",
    "from", "how", "i", "in", "is", "it", "me", "my", "of", "on", "or", "our", "should",
    "tell", "that", "the", "this", "to", "was", "we", "what", "when", "where", "which", "who",
    "why", "with", "you", "your",
];

// =============================================================================
// Types
// =============================================================================

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub content: String,
    /// File name of the source document, without directories.
    pub source: String,
    pub category: Option<String>,
    /// Fraction of distinct query terms present in the chunk.
    pub relevance: f32,
}

/// Aggregate figures for the loaded index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    /// Chunk count per category.
    pub categories: BTreeMap<String, usize>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Read access to the knowledge base.
pub trait KnowledgeBase: Send + Sync {
    /// Search with an optional category filter and result cap. `limit`
    /// falls back to the configured maximum when `None`.
    fn search_filtered(
        &self,
        query: &str,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError>;

    fn search(&self, query: &str) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        self.search_filtered(query, None, None)
    }

    /// Sorted distinct categories.
    fn categories(&self) -> Vec<String>;

    fn statistics(&self) -> KnowledgeStats;
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    content: String,
    source: String,
    category: Option<String>,
    terms: HashSet<String>,
}

/// Keyword index built from markdown files.
#[derive(Debug, Clone)]
pub struct KnowledgeIndex {
    chunks: Vec<IndexedChunk>,
    documents: usize,
    last_updated: Option<DateTime<Utc>>,
    chunk_size: usize,
    chunk_overlap: usize,
    max_results: usize,
    min_relevance: f32,
}

impl KnowledgeIndex {
    pub fn new(config: &KnowledgeConfig) -> Result<Self, KnowledgeError> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(KnowledgeError::InvalidChunking {
                size: config.chunk_size,
                overlap: config.chunk_overlap,
            });
        }
        Ok(Self {
            chunks: Vec::new(),
            documents: 0,
            last_updated: None,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_results: config.max_results,
            min_relevance: config.min_relevance,
        })
    }

    /// Build an index from every `.md` file under `dir`. Files in a
    /// subdirectory take the top-level subdirectory name as category.
    pub fn from_directory(dir: &Path, config: &KnowledgeConfig) -> Result<Self, KnowledgeError> {
        let mut index = Self::new(config)?;
        index.load_directory(dir)?;
        Ok(index)
    }

    /// Add every markdown file under `dir`. Returns the number of chunks
    /// added. Unreadable files are skipped with a warning.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, KnowledgeError> {
        if !dir.is_dir() {
            return Err(KnowledgeError::DirectoryNotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        collect_markdown(dir, &mut files)?;
        files.sort();

        let mut added = 0;
        for path in &files {
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            let category = path
                .strip_prefix(dir)
                .ok()
                .and_then(|rel| {
                    let mut parts = rel.components();
                    let first = parts.next()?;
                    parts.next()?;
                    Some(first.as_os_str().to_string_lossy().into_owned())
                });
            added += self.add_document(&path.to_string_lossy(), category.as_deref(), &content)?;
        }

        info!(
            directory = %dir.display(),
            documents = files.len(),
            chunks = added,
            "Knowledge base loaded"
        );
        Ok(added)
    }

    /// Chunk and index one document. Returns the number of chunks added.
    pub fn add_document(
        &mut self,
        source: &str,
        category: Option<&str>,
        content: &str,
    ) -> Result<usize, KnowledgeError> {
        let pieces = split_text(content, self.chunk_size, self.chunk_overlap)?;
        let source = short_source(source);
        let count = pieces.len();

        for piece in pieces {
            let terms = tokenize(&piece).into_iter().collect();
            self.chunks.push(IndexedChunk {
                content: piece,
                source: source.clone(),
                category: category.map(str::to_string),
                terms,
            });
        }
        self.documents += 1;
        self.last_updated = Some(Utc::now());
        debug!(source = %source, chunks = count, "Indexed document");
        Ok(count)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl KnowledgeBase for KnowledgeIndex {
    fn search_filtered(
        &self,
        query: &str,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<KnowledgeHit> = self
            .chunks
            .iter()
            .filter(|c| category.is_none() || c.category.as_deref() == category)
            .filter_map(|c| {
                let matched = terms.iter().filter(|t| c.terms.contains(*t)).count();
                let relevance = matched as f32 / terms.len() as f32;
                (matched > 0 && relevance >= self.min_relevance).then(|| KnowledgeHit {
                    content: c.content.clone(),
                    source: c.source.clone(),
                    category: c.category.clone(),
                    relevance,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        hits.truncate(limit.unwrap_or(self.max_results));
        debug!(query, hits = hits.len(), "Knowledge search");
        Ok(hits)
    }

    fn categories(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .chunks
            .iter()
            .filter_map(|c| c.category.as_deref())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    fn statistics(&self) -> KnowledgeStats {
        let mut categories = BTreeMap::new();
        for c in &self.chunks {
            if let Some(cat) = &c.category {
                *categories.entry(cat.clone()).or_insert(0) += 1;
            }
        }
        KnowledgeStats {
            total_documents: self.documents,
            total_chunks: self.chunks.len(),
            categories,
            last_updated: self.last_updated,
        }
    }
}

/// Lowercased alphanumeric terms with stop words removed, in order of first
/// appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Last path segment of a document location, for display.
pub fn short_source(source: &str) -> String {
    source
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source)
        .to_string()
}

fn collect_markdown(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<(), KnowledgeError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KnowledgeConfig {
        KnowledgeConfig {
            chunk_size: 200,
            chunk_overlap: 40,
            ..KnowledgeConfig::default()
        }
    }

    fn sample_index() -> KnowledgeIndex {
        let mut index = KnowledgeIndex::new(&config()).unwrap();
        index
            .add_document(
                "gs://bucket/docs/markdowns.md",
                Some("markdowns"),
                "Markdowns reduce the retail price of damaged or seasonal items.",
            )
            .unwrap();
        index
            .add_document(
                "docs/irr.md",
                Some("inventory"),
                "The IRR recap compares book inventory to SKU on-hand inventory.",
            )
            .unwrap();
        index
            .add_document(
                "docs/general.md",
                None,
                "Shrink is inventory loss measured by physical counts.",
            )
            .unwrap();
        index
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_duplicates() {
        assert_eq!(
            tokenize("What is the IRR, and why is IRR important?"),
            vec!["irr", "important"]
        );
    }

    #[test]
    fn test_short_source() {
        assert_eq!(short_source("gs://bucket/folder/file.md"), "file.md");
        assert_eq!(short_source("file.md"), "file.md");
        assert_eq!(short_source(r"C:\docs\a.md"), "a.md");
    }

    #[test]
    fn test_search_ranks_by_term_fraction() {
        let index = sample_index();
        let hits = index.search("book inventory recap").unwrap();
        assert_eq!(hits[0].source, "irr.md");
        assert_eq!(hits[0].relevance, 1.0);
        assert!(hits.iter().all(|h| h.relevance >= 0.5));
    }

    #[test]
    fn test_search_below_threshold_filtered() {
        let index = sample_index();
        let hits = index.search("damaged pallets forklift").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_category_filter() {
        let index = sample_index();
        let hits = index
            .search_filtered("inventory", Some("markdowns"), None)
            .unwrap();
        assert!(hits.is_empty());
        let hits = index
            .search_filtered("inventory", Some("inventory"), None)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category.as_deref(), Some("inventory"));
    }

    #[test]
    fn test_search_respects_limit() {
        let index = sample_index();
        assert_eq!(index.search("inventory").unwrap().len(), 2);
        assert_eq!(
            index.search_filtered("inventory", None, Some(1)).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_stop_word_query_returns_nothing() {
        let index = sample_index();
        assert!(index.search("what is the").unwrap().is_empty());
    }

    #[test]
    fn test_categories_and_statistics() {
        let index = sample_index();
        assert_eq!(index.categories(), vec!["inventory", "markdowns"]);
        let stats = index.statistics();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.categories.get("inventory"), Some(&1));
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn test_load_directory_with_categories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("policies")).unwrap();
        std::fs::write(dir.path().join("overview.md"), "Shrink overview text.").unwrap();
        std::fs::write(
            dir.path().join("policies").join("markdowns.md"),
            "Markdown policy for clearance items.",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let index = KnowledgeIndex::from_directory(dir.path(), &config()).unwrap();
        let stats = index.statistics();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(index.categories(), vec!["policies"]);

        let hits = index.search("clearance policy").unwrap();
        assert_eq!(hits[0].source, "markdowns.md");
    }

    #[test]
    fn test_missing_directory() {
        let result = KnowledgeIndex::from_directory(Path::new("/nonexistent/docs"), &config());
        assert!(matches!(result, Err(KnowledgeError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = KnowledgeConfig {
            chunk_size: 10,
            chunk_overlap: 20,
            ..KnowledgeConfig::default()
        };
        assert!(KnowledgeIndex::new(&cfg).is_err());
    }
}
