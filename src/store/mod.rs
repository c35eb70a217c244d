//! Vector store manager
//!
//! Single authoritative owner of one [`VectorIndex`] and its persistence
//! location. Orchestrates ingestion (chunk -> embed -> add -> save) and
//! search (embed -> lookup -> threshold filter). Mutations are serialized
//! behind a single-writer/multiple-reader lock; embedding always happens
//! before the lock is taken so a slow provider call never blocks readers.

use crate::chunking::Chunker;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{IndexError, SearchResult, VectorIndex};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

/// Result of an ingest call.
///
/// `durable` is false when the in-memory add succeeded but the follow-up
/// save did not: the chunks are searchable now but will not survive a
/// restart. Append-only semantics make rollback impractical, so this is
/// reported instead of undone.
#[derive(Debug)]
pub struct IngestOutcome {
    pub chunk_ids: Vec<String>,
    pub durable: bool,
}

/// Snapshot of the store's state.
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub embedding_dimension: usize,
    pub persist_location: PathBuf,
    pub generation: u64,
}

struct StoreInner {
    index: VectorIndex,
    generation: u64,
}

/// Owner of one vector index plus its persistence location.
pub struct VectorStore {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    persist_dir: PathBuf,
    inner: RwLock<StoreInner>,
}

impl VectorStore {
    /// Open a store at `persist_dir`, loading the persisted index if one
    /// exists. Any load failure (missing, corrupt, incompatible dimension)
    /// degrades to a fresh empty index; startup never fails on it.
    pub fn open(
        provider: Arc<dyn EmbeddingProvider>,
        chunker: Chunker,
        persist_dir: impl Into<PathBuf>,
    ) -> Self {
        let persist_dir = persist_dir.into();
        let dimension = provider.dimension();

        let index = match VectorIndex::load(&persist_dir) {
            Ok(index) if index.dimension() == dimension => {
                info!(
                    rows = index.len(),
                    path = ?persist_dir,
                    "loaded existing vector index"
                );
                index
            }
            Ok(index) => {
                warn!(
                    loaded = index.dimension(),
                    expected = dimension,
                    "persisted index dimension does not match embedding provider; starting fresh"
                );
                VectorIndex::new(dimension)
            }
            Err(IndexError::NotFound(_)) => {
                info!(path = ?persist_dir, "no persisted index; starting fresh");
                VectorIndex::new(dimension)
            }
            Err(e) => {
                warn!(error = %e, "failed to load persisted index; starting fresh");
                VectorIndex::new(dimension)
            }
        };

        Self {
            provider,
            chunker,
            persist_dir,
            inner: RwLock::new(StoreInner {
                index,
                generation: 1,
            }),
        }
    }

    /// Chunk, embed, and index a batch of documents, then persist.
    ///
    /// An embedding failure aborts the call with no index mutation. A save
    /// failure after a successful add is reported as `durable = false`,
    /// not rolled back.
    pub fn ingest(&self, documents: &[Document]) -> Result<IngestOutcome> {
        let chunks = self.chunker.split_documents(documents);
        if chunks.is_empty() {
            return Ok(IngestOutcome {
                chunk_ids: Vec::new(),
                durable: true,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        // Embed before taking the lock.
        let embeddings = self.provider.embed_batch(&texts)?;

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let entries: Vec<_> = embeddings.into_iter().zip(chunks).collect();

        let mut inner = self.inner.write().unwrap();
        inner.index.add(entries)?;

        let durable = match inner.index.save(&self.persist_dir) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    error = %e,
                    "index updated in memory but save failed; chunks are not durable"
                );
                false
            }
        };

        info!(
            chunks = chunk_ids.len(),
            total = inner.index.len(),
            durable,
            "ingested document chunks"
        );

        Ok(IngestOutcome { chunk_ids, durable })
    }

    /// Similarity search with relevance filtering. Never raises: internal
    /// errors are logged and an empty result is returned.
    ///
    /// Threshold filtering happens after retrieval, not by narrowing `k`,
    /// so "fewer than k exist" stays distinguishable from "results existed
    /// but were irrelevant".
    pub fn search(&self, query: &str, k: usize, score_threshold: f32) -> Vec<SearchResult> {
        let query_vector = match self.provider.embed(query) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "query embedding failed");
                return Vec::new();
            }
        };

        let results = {
            let inner = self.inner.read().unwrap();
            match inner.index.search(&query_vector, k) {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "index search failed");
                    return Vec::new();
                }
            }
        };

        let retrieved = results.len();
        let filtered: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.score >= score_threshold)
            .collect();

        info!(
            retrieved,
            relevant = filtered.len(),
            query = %truncate(query, 50),
            "similarity search complete"
        );

        filtered
    }

    /// Store statistics. Never raises.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read().unwrap();
        StoreStats {
            total_chunks: inner.index.len(),
            embedding_dimension: inner.index.dimension(),
            persist_location: self.persist_dir.clone(),
            generation: inner.generation,
        }
    }

    /// Build a fresh index generation from the retained documents and swap
    /// it in atomically. This is the only way content leaves the store;
    /// there is no in-place deletion.
    pub fn rebuild(&self, documents: &[Document]) -> Result<IngestOutcome> {
        let chunks = self.chunker.split_documents(documents);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.provider.embed_batch(&texts)?
        };

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let mut fresh = VectorIndex::new(self.provider.dimension());
        fresh.add(embeddings.into_iter().zip(chunks).collect())?;

        let mut inner = self.inner.write().unwrap();
        // Persist the new generation before exposing it; on failure the
        // active generation stays untouched.
        fresh.save(&self.persist_dir)?;
        inner.index = fresh;
        inner.generation += 1;

        info!(
            generation = inner.generation,
            chunks = chunk_ids.len(),
            "swapped in new index generation"
        );

        Ok(IngestOutcome {
            chunk_ids,
            durable: true,
        })
    }

    /// Replace the whole persisted structure with an empty generation.
    pub fn clear(&self) -> Result<()> {
        self.rebuild(&[])?;
        Ok(())
    }

    pub fn persist_location(&self) -> &Path {
        &self.persist_dir
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use tempfile::TempDir;

    fn store(dir: &Path) -> VectorStore {
        VectorStore::open(
            Arc::new(HashingEmbedder::with_default_dimension()),
            Chunker::default(),
            dir,
        )
    }

    #[test]
    fn test_open_on_empty_directory() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        let stats = store.stats();
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.embedding_dimension, 384);
        assert_eq!(stats.generation, 1);
    }

    #[test]
    fn test_ingest_and_search() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());

        let outcome = store
            .ingest(&[Document::new(
                "The sky is blue because of Rayleigh scattering.",
                "sky.txt",
            )])
            .unwrap();
        assert_eq!(outcome.chunk_ids, vec!["sky.txt_0"]);
        assert!(outcome.durable);

        let results = store.search("why is the sky blue", 5, 0.0);
        assert!(!results.is_empty());
        assert!(results[0].chunk.text.contains("Rayleigh scattering"));
    }

    #[test]
    fn test_threshold_filters_after_retrieval() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());

        store
            .ingest(&[Document::new("completely unrelated content", "a.txt")])
            .unwrap();

        // An impossible threshold removes everything without erroring.
        let results = store.search("quantum gravity", 5, 0.99);
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_on_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        assert!(store.search("anything", 5, 0.0).is_empty());
    }

    #[test]
    fn test_persistence_across_open() {
        let temp = TempDir::new().unwrap();
        {
            let store = store(temp.path());
            store
                .ingest(&[Document::new("persistent fact about oxygen", "o.txt")])
                .unwrap();
        }

        let reopened = store(temp.path());
        assert_eq!(reopened.stats().total_chunks, 1);
        let results = reopened.search("oxygen fact", 5, 0.0);
        assert!(!results.is_empty());
    }

    #[test]
    fn test_corrupt_index_degrades_to_fresh() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.json"), b"{broken").unwrap();

        let store = store(temp.path());
        assert_eq!(store.stats().total_chunks, 0);
    }

    #[test]
    fn test_rebuild_swaps_generation() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());

        store
            .ingest(&[
                Document::new("keep me around", "keep.txt"),
                Document::new("drop me entirely", "drop.txt"),
            ])
            .unwrap();
        assert_eq!(store.stats().total_chunks, 2);

        store
            .rebuild(&[Document::new("keep me around", "keep.txt")])
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.generation, 2);
        assert!(store.search("drop me", 5, 0.5).iter().all(|r| r.chunk.source() != "drop.txt"));
    }

    #[test]
    fn test_clear_replaces_everything() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store
            .ingest(&[Document::new("anything at all", "x.txt")])
            .unwrap();

        store.clear().unwrap();
        assert_eq!(store.stats().total_chunks, 0);

        // The persisted structure is replaced too.
        let reopened = self::store(temp.path());
        assert_eq!(reopened.stats().total_chunks, 0);
    }
}
