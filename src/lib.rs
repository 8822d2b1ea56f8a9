//! attck-pe - prompt-driven red-team code generation assistant
//!
//! Reference documents are indexed once at startup. Each operator prompt is
//! answered by a tool-using reasoning agent, re-formatted by the LLM into a
//! `{code, description, filename}` record, validated, and saved to disk.
//!
//! # Modules
//!
//! - `output` - the structured record, literal parser and response normalizer
//! - `prompts` - agent context and re-format templates
//! - `ollama` - Ollama client: generate, chat with tools, embeddings, unload
//! - `index` - document ingestion, embeddings, vector index and query engine
//! - `tools` - the `code_reader` and `code_generation` agent tools
//! - `agent` - the reasoning agent and its builder
//! - `pipeline` - the re-format step
//! - `generation` - the bounded retry loop
//! - `persistence` - writing generated code under the output directory
//! - `repl` - the interactive loop and post-round cleanup
//! - `config` - settings from the environment
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - logging and optional OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use attck_pe::{Generator, OutputStore};
//!
//! let generator = Generator::new(5);
//! if let Some(record) = generator.generate(&agent, "process injection in C", &pipeline).await {
//!     OutputStore::new("output").save(&record).await?;
//! }
//! ```

pub mod agent;
pub mod config;
pub mod generation;
pub mod index;
pub mod metrics;
pub mod ollama;
pub mod output;
pub mod persistence;
pub mod pipeline;
pub mod prompts;
pub mod repl;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{Agent, AgentError, CodeAgent, CodeAgentBuilder};
pub use config::{ConfigError, Settings};
pub use generation::{Generator, GenerationReport, DEFAULT_MAX_ATTEMPTS};
pub use output::{normalize_response, GeneratedCode};
pub use persistence::{OutputStore, PersistError};
pub use pipeline::{OutputPipeline, PipelineError, Reformatter};
pub use repl::{LoopSummary, PromptLoop, RoundCleanup};
