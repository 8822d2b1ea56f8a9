//! In-memory vector index over document chunks

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::documents::{split_text, Document, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use super::embedding::{cosine_similarity, EmbedModel, Embedder, Embedding, OllamaEmbedder, TfIdfEmbedder};
use super::IndexError;
use crate::ollama::OllamaClient;

/// Chunks embedded per request to the embedding backend
const EMBED_BATCH_SIZE: usize = 32;

/// A piece of a source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub source: PathBuf,
    pub text: String,
}

/// A chunk with its similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Immutable index of embedded chunks
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Embedding>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl VectorIndex {
    /// Chunk, embed and index documents with the configured embedding model
    ///
    /// # Arguments
    /// * `documents` - Documents to index
    /// * `model` - Resolved embedding model
    /// * `client` - Ollama client, used only for [`EmbedModel::Ollama`]
    pub async fn from_documents(
        documents: &[Document],
        model: &EmbedModel,
        client: &OllamaClient,
    ) -> Result<Self, IndexError> {
        let chunks = chunk_documents(documents);
        let embedder: Arc<dyn Embedder> = match model {
            EmbedModel::Local(_) => {
                let corpus: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
                Arc::new(TfIdfEmbedder::from_corpus(&corpus))
            }
            EmbedModel::Ollama(name) => Arc::new(OllamaEmbedder::new(client.clone(), name.clone())),
        };

        let index = Self::build(chunks, embedder).await?;
        info!(
            documents = documents.len(),
            chunks = index.len(),
            embed_model = %model,
            "Vector index built"
        );
        Ok(index)
    }

    /// Embed the given chunks with `embedder`
    pub async fn build(chunks: Vec<Chunk>, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(IndexError::EmbeddingCount {
                    expected: texts.len(),
                    actual: embedded.len(),
                });
            }
            vectors.extend(embedded);
        }

        Ok(Self {
            chunks,
            vectors,
            embedder,
        })
    }

    /// Return the `top_k` chunks most similar to `query`, best first
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.chunks.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or(IndexError::EmbeddingCount {
                expected: 1,
                actual: 0,
            })?;

        let mut results: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(self.vectors.iter())
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&query_vector, vector),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn chunk_documents(documents: &[Document]) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
                .into_iter()
                .map(move |text| Chunk {
                    source: doc.source.clone(),
                    text,
                })
        })
        .collect()
}
