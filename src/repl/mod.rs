//! Interactive prompt loop
//!
//! Reads one prompt per line, runs a generation round for it, prints the
//! result and saves the code. `q` or end of input stops the loop. Every round
//! is followed by the optional [`RoundCleanup`] hook, whatever its outcome.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::generation::Generator;
use crate::ollama::OllamaClient;
use crate::persistence::OutputStore;
use crate::pipeline::Reformatter;

/// Shown before every read
pub const PROMPT_TEXT: &str = "Enter a prompt (q to quit): ";

/// Input line that ends the loop
pub const QUIT_SENTINEL: &str = "q";

/// Best-effort work done after every round
#[async_trait]
pub trait RoundCleanup: Send + Sync {
    async fn after_round(&self);
}

/// Evicts models from Ollama after each round to release accelerator memory
pub struct ModelUnloader {
    client: OllamaClient,
    models: Vec<String>,
}

impl ModelUnloader {
    pub fn new(client: OllamaClient, models: Vec<String>) -> Self {
        let mut models = models;
        models.sort();
        models.dedup();
        Self { client, models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[async_trait]
impl RoundCleanup for ModelUnloader {
    async fn after_round(&self) {
        for model in &self.models {
            match self.client.unload(model).await {
                Ok(()) => debug!(model = %model, "Unloaded model"),
                Err(e) => warn!(model = %model, error = %e, "Failed to unload model"),
            }
        }
    }
}

/// Counters for one loop run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Prompts processed (the sentinel is not counted)
    pub rounds: usize,
    /// Rounds that produced a record
    pub generated: usize,
    /// Records written to disk
    pub saved: usize,
}

/// The operator-facing loop
pub struct PromptLoop {
    agent: Arc<dyn Agent>,
    pipeline: Arc<dyn Reformatter>,
    generator: Generator,
    store: OutputStore,
    cleanup: Option<Arc<dyn RoundCleanup>>,
}

impl PromptLoop {
    pub fn new(
        agent: Arc<dyn Agent>,
        pipeline: Arc<dyn Reformatter>,
        generator: Generator,
        store: OutputStore,
    ) -> Self {
        Self {
            agent,
            pipeline,
            generator,
            store,
            cleanup: None,
        }
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn RoundCleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Run until the sentinel or end of input
    ///
    /// Only I/O errors on `input`/`output` end the loop early.
    pub async fn run<R, W>(&self, mut input: R, output: &mut W) -> std::io::Result<LoopSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut summary = LoopSummary::default();
        let mut line = String::new();

        loop {
            output.write_all(PROMPT_TEXT.as_bytes()).await?;
            output.flush().await?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                output.write_all(b"\n").await?;
                break;
            }
            let prompt = line.trim_end_matches(['\r', '\n']);
            if prompt == QUIT_SENTINEL {
                break;
            }

            summary.rounds += 1;
            let result = self.round(prompt, output, &mut summary).await;
            if let Some(cleanup) = &self.cleanup {
                cleanup.after_round().await;
            }
            result?;
        }

        output.flush().await?;
        Ok(summary)
    }

    async fn round<W>(&self, prompt: &str, output: &mut W, summary: &mut LoopSummary) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let record = self
            .generator
            .generate(self.agent.as_ref(), prompt, self.pipeline.as_ref())
            .await;

        let Some(record) = record else {
            let message = format!(
                "Failed to generate code after {} attempts.\n",
                self.generator.max_attempts()
            );
            return output.write_all(message.as_bytes()).await;
        };

        summary.generated += 1;
        let report = format!(
            "Code Generated\n{}\n\n\nDescription: {}\n",
            record.code(),
            record.description()
        );
        output.write_all(report.as_bytes()).await?;

        let saved = match self.store.save(&record).await {
            Ok(path) => {
                summary.saved += 1;
                format!("Saved file {}\n", path.display())
            }
            Err(e) => format!("Error saving file: {}\n", e),
        };
        output.write_all(saved.as_bytes()).await
    }
}
