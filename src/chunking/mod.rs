//! Recursive character chunking
//!
//! Splits loaded documents into overlapping text windows, the unit of
//! indexing. Separators are tried in priority order (paragraph break, line
//! break, space, character fallback) until every window fits the configured
//! maximum size. Splitting is deterministic for fixed parameters, which is
//! what makes chunk identities stable across re-ingestion.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Invalid chunking parameters: {0}")]
    InvalidParameters(String),
}

/// A bounded text window derived from a document.
///
/// `chunk_id` is deterministic: `"<source>_<chunk_index>"`, with
/// `chunk_index` counted per source. Re-ingesting the same source with
/// unchanged chunking parameters yields identical ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: std::collections::BTreeMap<String, String>,
    pub chunk_id: String,
    pub chunk_index: usize,
}

impl Chunk {
    /// Source name recorded at load time.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

/// Recursive character splitter.
///
/// All sizes are measured in characters (Unicode scalar values), never
/// bytes, so multi-byte input cannot cause a mid-codepoint split.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidParameters(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::InvalidParameters(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into windows of at most `chunk_size` characters,
    /// adjacent windows sharing roughly `chunk_overlap` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            // Fits in one window: no overlap applied.
            return vec![trimmed.to_string()];
        }
        self.split_recursive(text, &self.separators)
    }

    /// Split a batch of documents into chunks with per-source identity.
    ///
    /// Documents sharing a `source` (e.g. pages of one file) continue the
    /// same chunk_index sequence, keeping chunk_id unique within the source.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut counters: HashMap<String, usize> = HashMap::new();
        let mut chunks = Vec::new();

        for doc in documents {
            let source = doc.source().to_string();
            for text in self.split_text(&doc.text) {
                let index = counters.entry(source.clone()).or_insert(0);
                chunks.push(Chunk {
                    text,
                    metadata: doc.metadata.clone(),
                    chunk_id: format!("{}_{}", source, *index),
                    chunk_index: *index,
                });
                *index += 1;
            }
        }

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator that occurs in the text; the empty-string
        // fallback always matches.
        let (sep_pos, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(s.as_str()))
            .map(|(i, s)| (i, s.clone()))
            .unwrap_or((separators.len().saturating_sub(1), String::new()));
        let remaining = &separators[sep_pos + 1..];

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator.as_str()).map(str::to_string).collect()
        };

        let mut final_chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                good.push(piece);
            } else {
                if !good.is_empty() {
                    final_chunks.extend(self.merge(&good, &separator));
                    good.clear();
                }
                if remaining.is_empty() {
                    // Cannot split further; emit oversized piece as-is.
                    final_chunks.push(piece);
                } else {
                    final_chunks.extend(self.split_recursive(&piece, remaining));
                }
            }
        }

        if !good.is_empty() {
            final_chunks.extend(self.merge(&good, &separator));
        }

        final_chunks
    }

    /// Merge small pieces into windows up to `chunk_size`, carrying
    /// `chunk_overlap` characters of trailing context into the next window.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: std::collections::VecDeque<String> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            let added = piece_len + if current.is_empty() { 0 } else { sep_len };

            if total + added > self.chunk_size && !current.is_empty() {
                if let Some(window) = join_window(&current, separator) {
                    windows.push(window);
                }
                // Shrink from the front until the retained tail fits the
                // overlap budget and the incoming piece.
                while total > self.chunk_overlap
                    || (total + piece_len + if current.is_empty() { 0 } else { sep_len }
                        > self.chunk_size
                        && total > 0)
                {
                    if let Some(front) = current.pop_front() {
                        total -= char_len(&front) + if current.is_empty() { 0 } else { sep_len };
                    } else {
                        break;
                    }
                }
            }

            total += piece_len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece.clone());
        }

        if let Some(window) = join_window(&current, separator) {
            windows.push(window);
        }

        windows
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
            .unwrap_or_else(|_| unreachable!("default parameters are valid"))
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_window(
    pieces: &std::collections::VecDeque<String>,
    separator: &str,
) -> Option<String> {
    let joined = pieces
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, source: &str) -> Document {
        Document::new(text, source)
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.split_documents(&[doc("short note", "note.txt")]);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short note");
        assert_eq!(chunks[0].chunk_id, "note.txt_0");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_split_is_deterministic() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "First paragraph with some words.\n\nSecond paragraph here.\n\nThird one, a little longer than the rest of them.";

        let a = chunker.split_text(text);
        let b = chunker.split_text(text);
        assert_eq!(a, b);
        assert!(a.len() > 1);

        let chunks_a = chunker.split_documents(&[doc(text, "a.txt")]);
        let chunks_b = chunker.split_documents(&[doc(text, "a.txt")]);
        assert_eq!(chunks_a, chunks_b);
    }

    #[test]
    fn test_windows_respect_max_size() {
        let chunker = Chunker::new(40, 8).unwrap();
        let text = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen";

        for window in chunker.split_text(text) {
            assert!(window.chars().count() <= 40, "window too long: {window:?}");
        }
    }

    #[test]
    fn test_adjacent_windows_overlap() {
        let chunker = Chunker::new(30, 12).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";

        let windows = chunker.split_text(text);
        assert!(windows.len() > 1);

        // Each window after the first repeats at least one word from its
        // predecessor's tail.
        for pair in windows.windows(2) {
            let prev_tail: Vec<&str> = pair[0].split(' ').rev().take(3).collect();
            assert!(
                prev_tail.iter().any(|w| pair[1].contains(w)),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_per_source_chunk_ids() {
        let chunker = Chunker::new(20, 5).unwrap();
        let docs = vec![
            doc("page one text that is fairly long here", "book.pdf"),
            doc("page two text that is also fairly long", "book.pdf"),
            doc("other file", "notes.txt"),
        ];

        let chunks = chunker.split_documents(&docs);

        let book_ids: Vec<&str> = chunks
            .iter()
            .filter(|c| c.source() == "book.pdf")
            .map(|c| c.chunk_id.as_str())
            .collect();
        // Indices continue across pages of the same source.
        for (i, id) in book_ids.iter().enumerate() {
            assert_eq!(*id, format!("book.pdf_{}", i));
        }
        assert!(chunks.iter().any(|c| c.chunk_id == "notes.txt_0"));
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        let chunker = Chunker::new(10, 3).unwrap();
        let text = "héllo wörld ünïcödé té xt çhàrs œuf æther ßharp";
        let windows = chunker.split_text(text);
        assert!(!windows.is_empty());
        for w in windows {
            assert!(w.chars().count() <= 10);
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 200).is_err());
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("   \n\n  ").is_empty());
    }
}
