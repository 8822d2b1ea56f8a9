//! Re-formatting pipeline
//!
//! The agent's answer is free text. The pipeline feeds it through the fixed
//! `code_parser` template (plus the record's JSON schema) to the LLM and
//! returns whatever text comes back; turning that text into a record is the
//! normalizer's job.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::metrics::LLM_CALL_TIME;
use crate::ollama::{OllamaClient, OllamaError};
use crate::output::format_instructions;
use crate::prompts::PromptTemplate;

/// Placeholder in the re-format template that receives the agent's answer
pub const RESPONSE_PLACEHOLDER: &str = "response";

/// Asks a model to restate an answer in the structured shape
#[async_trait]
pub trait Reformatter: Send + Sync {
    async fn reformat(&self, response: &str) -> Result<String, PipelineError>;
}

/// Error type for the re-format step
#[derive(Debug)]
pub enum PipelineError {
    /// The completion request failed
    Ollama(OllamaError),
    /// The model returned no text
    EmptyResponse,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Ollama(e) => write!(f, "Reformat request failed: {}", e),
            PipelineError::EmptyResponse => write!(f, "Reformat returned no text"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<OllamaError> for PipelineError {
    fn from(e: OllamaError) -> Self {
        PipelineError::Ollama(e)
    }
}

/// The re-format template bound to a completion model
///
/// Stateless after construction; one instance serves every attempt.
pub struct OutputPipeline {
    llm: OllamaClient,
    model: String,
    template: PromptTemplate,
}

impl OutputPipeline {
    /// # Arguments
    /// * `llm` - Completion client
    /// * `model` - Model used for re-formatting (e.g., "dolphin-mistral:latest")
    /// * `parser_template` - Template text containing `{response}`
    pub fn new(llm: OllamaClient, model: impl Into<String>, parser_template: &str) -> Self {
        Self {
            llm,
            model: model.into(),
            template: PromptTemplate::new(format_instructions(parser_template)),
        }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// The full prompt sent for `response`
    pub fn render(&self, response: &str) -> String {
        self.template.render(&[(RESPONSE_PLACEHOLDER, response)])
    }
}

#[async_trait]
impl Reformatter for OutputPipeline {
    async fn reformat(&self, response: &str) -> Result<String, PipelineError> {
        let prompt = self.render(response);

        let start = Instant::now();
        let completion = self.llm.generate(prompt, self.model.as_str()).await?;
        LLM_CALL_TIME
            .with_label_values(&[&self.model])
            .observe(start.elapsed().as_secs_f64());
        debug!(
            model = %self.model,
            eval_count = completion.eval_count,
            "Reformat completed"
        );

        if completion.response.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        Ok(completion.response)
    }
}
