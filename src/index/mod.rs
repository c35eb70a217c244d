//! Append-only vector index with exact cosine search
//!
//! Stores (row id, vector, chunk) triples. Row ids are sequential and never
//! reused; no delete operation exists — callers needing removal rebuild a
//! fresh index from retained sources (see the store's generation swap).
//! Search is an exact scan over normalized vectors, so rankings are
//! bit-for-bit reproducible across a save/load cycle.

use crate::chunking::Chunk;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use thiserror::Error;

/// File name inside the persist directory holding the full row set.
const INDEX_FILE: &str = "index.json";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index not found at {0}")]
    NotFound(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A retrieved chunk with its similarity score (dot product on normalized
/// vectors; higher is more similar).
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRow {
    row_id: u64,
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Append-only vector index.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    next_row_id: u64,
    rows: Vec<IndexRow>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            next_row_id: 0,
            rows: Vec::new(),
        }
    }

    /// Append entries, assigning sequential row ids. Existing rows are never
    /// mutated or removed.
    pub fn add(&mut self, entries: Vec<(Vec<f32>, Chunk)>) -> Result<Vec<u64>, IndexError> {
        for (vector, _) in &entries {
            if vector.len() != self.dimension {
                return Err(IndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        let mut assigned = Vec::with_capacity(entries.len());
        for (vector, chunk) in entries {
            let row_id = self.next_row_id;
            self.next_row_id += 1;
            self.rows.push(IndexRow {
                row_id,
                vector,
                chunk,
            });
            assigned.push(row_id);
        }

        Ok(assigned)
    }

    /// Top-k by descending similarity; ties broken by insertion order.
    /// An empty index answers with an empty result, not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.rows.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, u64, &Chunk)> = self
            .rows
            .iter()
            .map(|row| (dot(query, &row.vector), row.row_id, &row.chunk))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, _, chunk)| SearchResult {
                chunk: chunk.clone(),
                score,
            })
            .collect())
    }

    /// Persist the full row set to `dir/index.json`, atomically
    /// (temp file + rename), so readers never observe a partial write.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir).map_err(|e| IndexError::Io {
            source: e,
            context: format!("Failed to create index directory {:?}", dir),
        })?;

        let payload = serde_json::to_vec(self)?;

        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        let target = dir.join(INDEX_FILE);

        std::fs::write(&tmp, payload).map_err(|e| IndexError::Io {
            source: e,
            context: format!("Failed to write index file {:?}", tmp),
        })?;
        std::fs::rename(&tmp, &target).map_err(|e| IndexError::Io {
            source: e,
            context: format!("Failed to move index file into place at {:?}", target),
        })?;

        tracing::debug!(rows = self.rows.len(), path = ?target, "vector index saved");
        Ok(())
    }

    /// Restore a previously saved index.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Err(IndexError::NotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(&path).map_err(|e| IndexError::Io {
            source: e,
            context: format!("Failed to read index file {:?}", path),
        })?;

        let index: VectorIndex = serde_json::from_slice(&bytes)?;
        tracing::debug!(rows = index.rows.len(), path = ?path, "vector index loaded");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
