//! Reasoning agent
//!
//! The generation orchestrator only relies on the [`Agent`] trait: one prompt
//! in, one free-text answer out, failures surfaced as errors. [`CodeAgent`] is
//! the concrete think/act/observe loop over Ollama's `/api/chat` with the two
//! session tools.
//!
//! # Architecture
//!
//! ```text
//! prompt → CodeAgent → Ollama /api/chat (with tools)
//!              ↓
//!        tool call: code_generation | code_reader
//!              ↓
//!        ToolSet.invoke() → observation text
//!              ↓
//!        feed observation back to Ollama → loop or final answer
//! ```

pub mod controller;

use async_trait::async_trait;

pub use controller::{AgentError, AgentResult, CodeAgent, CodeAgentBuilder, DEFAULT_MAX_ITERATIONS};

/// Anything that turns a natural-language prompt into a free-text answer
#[async_trait]
pub trait Agent: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, AgentError>;
}
