//! Embedding generation
//!
//! Architecture:
//! - `EmbeddingProvider` trait for abstraction
//! - `FastEmbedProvider` for local model inference (all-MiniLM-L6-v2, 384-dim)
//! - `HashingEmbedder` as a deterministic, model-free degraded mode
//!
//! All providers emit unit-L2-normalized vectors, so cosine similarity and
//! dot product coincide; that fixes the metric used by the vector index.

mod hashing;
mod provider;

pub use hashing::HashingEmbedder;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
