//! Retrieval-augmented query engine

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::vector::VectorIndex;
use super::IndexError;
use crate::metrics::LLM_CALL_TIME;
use crate::ollama::OllamaClient;
use crate::prompts::PromptTemplate;

/// Number of chunks put into the answering prompt by default
pub const DEFAULT_TOP_K: usize = 2;

/// Question-answering prompt used over retrieved context
const TEXT_QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query_str}\n\
Answer: ";

/// Answers natural-language queries against indexed documents
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, text: &str) -> Result<String, IndexError>;
}

/// Retrieve top-k chunks, then let the LLM answer from them
pub struct RetrieverQueryEngine {
    index: Arc<VectorIndex>,
    llm: OllamaClient,
    model: String,
    top_k: usize,
    template: PromptTemplate,
}

impl RetrieverQueryEngine {
    pub fn new(index: Arc<VectorIndex>, llm: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            index,
            llm,
            model: model.into(),
            top_k: DEFAULT_TOP_K,
            template: PromptTemplate::new(TEXT_QA_TEMPLATE),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Build the answering prompt for `query` from the retrieved context
    pub async fn build_prompt(&self, query: &str) -> Result<String, IndexError> {
        let hits = self.index.retrieve(query, self.top_k).await?;
        let context = hits
            .iter()
            .map(|hit| format!("source: {}\n\n{}", hit.chunk.source.display(), hit.chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(hits = hits.len(), "Retrieved context for query");
        Ok(self.template.render(&[("context_str", &context), ("query_str", query)]))
    }
}

#[async_trait]
impl QueryEngine for RetrieverQueryEngine {
    async fn query(&self, text: &str) -> Result<String, IndexError> {
        let prompt = self.build_prompt(text).await?;

        let start = Instant::now();
        let response = self.llm.generate(prompt, self.model.as_str()).await?;
        LLM_CALL_TIME
            .with_label_values(&[&self.model])
            .observe(start.elapsed().as_secs_f64());

        Ok(response.response)
    }
}
