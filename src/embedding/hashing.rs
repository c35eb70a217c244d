/// Deterministic hashing embedder (model-free degraded mode)
///
/// Hashes lowercased alphanumeric tokens into a fixed-dimension
/// bag-of-words vector and L2-normalizes it. No model download, no
/// network, bitwise-deterministic for identical input — texts sharing
/// vocabulary get positive cosine similarity, which is enough for the
/// offline mode and for hermetic tests of everything above the provider.
use super::{EmbeddingError, EmbeddingProvider};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// 384 dimensions, matching the default model so indexes stay
    /// dimension-compatible across modes.
    pub fn with_default_dimension() -> Self {
        Self::new(384)
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];
        let mut any_token = false;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            any_token = true;
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();

            let slot = (h % self.dimension as u64) as usize;
            // One hash bit decides the sign, spreading mass across both
            // half-spaces so unrelated texts stay near-orthogonal.
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        if !any_token {
            return Err(EmbeddingError::InvalidInput(
                "Text contains no tokens".to_string(),
            ));
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_one(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing-bow"
    }
}
