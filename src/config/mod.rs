//! Configuration management
//!
//! Central TOML-backed configuration for the whole backend. Malformed
//! parameters are rejected here, before any core component is built;
//! secrets never live in the file — only the environment variable name
//! that holds them does.

use crate::error::{Result, TutorError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub llm: LlmConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted vector index
    pub data_dir: PathBuf,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub model: String,
    /// Embedding dimension (384 for MiniLM)
    pub dimension: usize,
    /// Use the model-free hashing embedder instead of a local model
    pub offline: bool,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of candidates fetched from the index
    pub k: usize,
    /// Minimum similarity a result must meet to count as relevant
    pub score_threshold: f32,
}

/// Conversation context window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Turns inspected for the first-interaction check
    pub max_total: usize,
    /// Turns actually included in the generation prompt
    pub max_in_prompt: usize,
}

/// Generation provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: default_data_dir(),
            },
            chunking: ChunkingConfig {
                chunk_size: crate::chunking::DEFAULT_CHUNK_SIZE,
                chunk_overlap: crate::chunking::DEFAULT_CHUNK_OVERLAP,
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                offline: false,
            },
            retrieval: RetrievalConfig {
                k: 5,
                score_threshold: 0.7,
            },
            context: ContextConfig {
                max_total: 10,
                max_in_prompt: 6,
            },
            llm: LlmConfig {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "gemma2-9b-it".to_string(),
                api_key_env: "TUTORAG_API_KEY".to_string(),
                temperature: 0.7,
                max_tokens: 500,
            },
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tutorag")
        .join("vector_store")
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TutorError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TutorError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load from a file if it exists, else fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TutorError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| TutorError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Environment variable overrides for deployment-specific values.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("TUTORAG_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(model) = std::env::var("TUTORAG_MODEL_NAME") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("TUTORAG_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
    }

    /// Reject malformed parameters before any component is built.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(TutorError::InvalidConfigValue {
                path: "chunking.chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(TutorError::InvalidConfigValue {
                path: "chunking.chunk_overlap".to_string(),
                message: "must be smaller than chunk_size".to_string(),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(TutorError::InvalidConfigValue {
                path: "embedding.dimension".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.retrieval.k == 0 {
            return Err(TutorError::InvalidConfigValue {
                path: "retrieval.k".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if !self.retrieval.score_threshold.is_finite() {
            return Err(TutorError::InvalidConfigValue {
                path: "retrieval.score_threshold".to_string(),
                message: "must be a finite number".to_string(),
            });
        }
        if self.context.max_in_prompt > self.context.max_total {
            return Err(TutorError::InvalidConfigValue {
                path: "context.max_in_prompt".to_string(),
                message: "must not exceed context.max_total".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(TutorError::InvalidConfigValue {
                path: "llm.temperature".to_string(),
                message: "must be between 0.0 and 2.0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.context.max_total, 10);
        assert_eq!(config.context.max_in_prompt, 6);
    }

    #[test]
    fn test_toml_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config::default();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.chunking.chunk_size, config.chunking.chunk_size);
        assert_eq!(loaded.llm.model, config.llm.model);
        assert_eq!(loaded.embedding.dimension, config.embedding.dimension);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_window_rejected() {
        let mut config = Config::default();
        config.context.max_in_prompt = config.context.max_total + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(TutorError::ConfigNotFound { .. })));
    }
}
