//! Tutorag - Retrieval-Augmented Tutoring Backend
//!
//! Answers student questions by combining a locally maintained vector
//! knowledge base with an LLM fallback. Documents are split into overlapping
//! chunks, embedded locally, and stored in a persistent append-only vector
//! index; queries retrieve relevant chunks, assemble a bounded conversation
//! context, and hand a prompt to the generation provider with a deterministic
//! introduction/fallback policy.

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod rag;
pub mod store;

pub use error::{Result, TutorError};
