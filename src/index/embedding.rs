//! Embedding providers
//!
//! Two backends sit behind the [`Embedder`] trait:
//! - [`TfIdfEmbedder`] - pure Rust, built from the indexed corpus, no network
//! - [`OllamaEmbedder`] - any embedding model served by Ollama (`/api/embed`)
//!
//! [`EmbedModel::parse`] maps the configured model name onto one of them.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::IndexError;
use crate::ollama::OllamaClient;

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Stop words filtered out before TF-IDF weighting.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "in", "on", "of", "to", "and", "or", "for", "with", "this",
    "that", "be", "are", "was", "were", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "shall", "not", "no",
    "but", "if", "at", "by", "from", "as", "into", "about", "up", "out", "so", "its", "you",
    "your", "i", "my", "we", "our", "they", "them", "their", "he", "she", "his", "her",
];

/// Which embedding backend to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedModel {
    /// `local:<name>` - in-process TF-IDF; the name is kept for logging only
    Local(String),
    /// `ollama:<model>` or a bare model name served by Ollama
    Ollama(String),
}

impl EmbedModel {
    /// Resolve a configured embedding model name
    pub fn parse(name: &str) -> Result<Self, IndexError> {
        let name = name.trim();
        if let Some(local) = name.strip_prefix("local:") {
            return Ok(EmbedModel::Local(local.to_string()));
        }
        let model = name.strip_prefix("ollama:").unwrap_or(name).trim();
        if model.is_empty() {
            return Err(IndexError::EmptyModelName);
        }
        Ok(EmbedModel::Ollama(model.to_string()))
    }
}

impl std::fmt::Display for EmbedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedModel::Local(name) => write!(f, "local:{}", name),
            EmbedModel::Ollama(model) => write!(f, "ollama:{}", model),
        }
    }
}

/// Turns texts into vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the result has one vector per input, in order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, IndexError>;
}

/// Cosine similarity between two vectors.
///
/// Mismatched or empty vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// TF-IDF embedding provider.
///
/// Builds a vocabulary + IDF weights from the corpus being indexed and embeds
/// text into TF-IDF vectors normalized to unit length.
#[derive(Debug, Clone)]
pub struct TfIdfEmbedder {
    /// term → dimension index
    vocabulary: HashMap<String, usize>,
    /// IDF weight per dimension
    idf: Vec<f32>,
}

impl TfIdfEmbedder {
    /// Build from a corpus of documents
    pub fn from_corpus(documents: &[&str]) -> Self {
        let n = documents.len() as f32;
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for document in documents {
            let tokens = tokenize(document);
            let unique: HashSet<&str> = tokens.iter().map(|t| t.as_str()).collect();
            for term in unique {
                *doc_freq.entry(term.to_string()).or_insert(0) += 1;
                if !vocabulary.contains_key(term) {
                    let idx = vocabulary.len();
                    vocabulary.insert(term.to_string(), idx);
                }
            }
        }

        let mut idf = vec![0.0f32; vocabulary.len()];
        for (term, &idx) in &vocabulary {
            let df = *doc_freq.get(term).unwrap_or(&0) as f32;
            // Smoothed IDF: log(N / df) + 1
            idf[idx] = (n / df.max(1.0)).ln() + 1.0;
        }

        Self { vocabulary, idf }
    }

    /// Dimensionality of the embedding space (vocabulary size)
    pub fn dimensions(&self) -> usize {
        self.idf.len()
    }

    /// Embed a single text
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions()];
        if vector.is_empty() {
            return vector;
        }

        let mut tf: HashMap<String, f32> = HashMap::new();
        for token in tokenize(text) {
            *tf.entry(token).or_insert(0.0) += 1.0;
        }
        for (term, count) in &tf {
            if let Some(&idx) = self.vocabulary.get(term) {
                vector[idx] = count * self.idf[idx];
            }
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for TfIdfEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, IndexError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Embeddings computed by an Ollama-served model
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.client.embed(&self.model, texts).await?;
        if vectors.len() != texts.len() {
            return Err(IndexError::EmbeddingCount {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

/// Tokenize text: lowercase, split on non-alphanumeric, filter stop words.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Normalize a vector to unit length (in-place).
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
