//! Document model and format-dispatched loaders
//!
//! Loaders turn a file on disk into ordered [`Document`] segments with
//! positional metadata. The set of ingestible formats is a closed enum;
//! unrecognized extensions are rejected here, before any core component
//! is invoked.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unsupported file type: {extension}. Allowed: pdf, txt, docx, md")]
    UnsupportedFormat { extension: String },

    #[error("No loader registered for format: {format:?}")]
    NoLoader { format: DocumentFormat },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Loader failed for {path}: {message}")]
    Loader { path: String, message: String },
}

/// A raw document segment produced by a loader. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), source.into());
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Source name this document was loaded from, if recorded.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

/// Closed set of ingestible formats, each mapped to exactly one loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Docx,
    Markdown,
}

impl DocumentFormat {
    /// Map a file extension to a format, rejecting unknown ones at the
    /// boundary rather than via a lookup miss deeper in the pipeline.
    pub fn from_extension(ext: &str) -> Result<Self, DocumentError> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Text),
            "docx" => Ok(Self::Docx),
            "md" => Ok(Self::Markdown),
            other => Err(DocumentError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }
}

/// A loader turns a file path into ordered document segments.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Document>, DocumentError>;
}

/// Plain-text loader, used for both `.txt` and `.md` files. Yields a single
/// segment whose `source` metadata is the file name.
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, path: &Path) -> Result<Vec<Document>, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(vec![Document::new(text, source)])
    }
}

/// Static dispatch table from format to loader.
///
/// Text and Markdown loaders are built in. PDF and Word loaders are
/// injection points: callers with a parser register one, and attempting to
/// load an unregistered format is a configuration error.
pub struct LoaderRegistry {
    loaders: HashMap<DocumentFormat, Box<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        let mut loaders: HashMap<DocumentFormat, Box<dyn DocumentLoader>> = HashMap::new();
        loaders.insert(DocumentFormat::Text, Box::new(PlainTextLoader));
        loaders.insert(DocumentFormat::Markdown, Box::new(PlainTextLoader));
        Self { loaders }
    }

    /// Register (or replace) the loader for a format.
    pub fn register(&mut self, format: DocumentFormat, loader: Box<dyn DocumentLoader>) {
        self.loaders.insert(format, loader);
    }

    pub fn load(&self, path: &Path, format: DocumentFormat) -> Result<Vec<Document>, DocumentError> {
        let loader = self
            .loaders
            .get(&format)
            .ok_or(DocumentError::NoLoader { format })?;
        loader.load(path)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DocumentFormat::from_extension("pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_extension(".MD").unwrap(),
            DocumentFormat::Markdown
        );
        assert!(DocumentFormat::from_extension("exe").is_err());
        assert!(DocumentFormat::from_extension("").is_err());
    }

    #[test]
    fn test_plain_text_loader() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "hello world").unwrap();

        let registry = LoaderRegistry::new();
        let docs = registry.load(&path, DocumentFormat::Text).unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello world");
        assert_eq!(docs[0].source(), "notes.txt");
    }

    #[test]
    fn test_unregistered_format_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("paper.pdf");
        std::fs::write(&path, "%PDF-1.4").unwrap();

        let registry = LoaderRegistry::new();
        let result = registry.load(&path, DocumentFormat::Pdf);
        assert!(matches!(result, Err(DocumentError::NoLoader { .. })));
    }
}
