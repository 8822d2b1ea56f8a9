//! Document index for retrieval
//!
//! Reference documents are read from a directory, split into chunks, embedded
//! and stored in an in-memory [`VectorIndex`]. A [`QueryEngine`] answers
//! questions by retrieving the closest chunks and asking the LLM to answer from
//! them.
//!
//! ```text
//! document dir → DocumentReader → chunks → Embedder → VectorIndex
//!                                                         ↓
//!                     query text → RetrieverQueryEngine → LLM answer
//! ```
//!
//! The index is built once at startup and never modified afterwards.

pub mod documents;
pub mod embedding;
pub mod query_engine;
pub mod vector;

use std::path::PathBuf;

use crate::ollama::OllamaError;

pub use documents::{split_text, Document, DocumentReader, FileExtractor, PlainTextExtractor};
pub use embedding::{cosine_similarity, EmbedModel, Embedder, Embedding, OllamaEmbedder, TfIdfEmbedder};
pub use query_engine::{QueryEngine, RetrieverQueryEngine, DEFAULT_TOP_K};
pub use vector::{Chunk, ScoredChunk, VectorIndex};

/// Error type for indexing and querying
#[derive(Debug)]
pub enum IndexError {
    /// Reading a file or directory failed
    Io { path: PathBuf, source: std::io::Error },
    /// The document path is not a directory
    NotADirectory(PathBuf),
    /// No readable documents were found
    NoDocuments(PathBuf),
    /// An extractor could not turn a file into text
    Extract { path: PathBuf, message: String },
    /// Embedding model name is empty
    EmptyModelName,
    /// The embedding backend returned a different number of vectors than inputs
    EmbeddingCount { expected: usize, actual: usize },
    /// The embedding or completion request failed
    Ollama(OllamaError),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::Io { path, source } => write!(f, "Cannot read {}: {}", path.display(), source),
            IndexError::NotADirectory(path) => write!(f, "{} is not a directory", path.display()),
            IndexError::NoDocuments(path) => write!(f, "No documents found in {}", path.display()),
            IndexError::Extract { path, message } => {
                write!(f, "Cannot extract text from {}: {}", path.display(), message)
            }
            IndexError::EmptyModelName => write!(f, "No embedding model name given"),
            IndexError::EmbeddingCount { expected, actual } => {
                write!(f, "Expected {} embeddings, got {}", expected, actual)
            }
            IndexError::Ollama(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<OllamaError> for IndexError {
    fn from(e: OllamaError) -> Self {
        IndexError::Ollama(e)
    }
}
