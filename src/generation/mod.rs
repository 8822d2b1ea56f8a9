//! Generation orchestrator
//!
//! One round turns an operator prompt into a [`GeneratedCode`] record:
//!
//! ```text
//! attempt n: agent.query(prompt) → reformatter.reformat(answer) → normalize
//!               │ error               │ error                      │ absent
//!               └─────────────────────┴────────────────────────────┴→ attempt n+1
//! ```
//!
//! Every attempt counts against the bound, whatever made it fail. Failures
//! are logged and collected, never propagated; exhaustion is reported as
//! `None`.

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::Agent;
use crate::metrics::{GENERATIONS, GENERATION_ATTEMPTS};
use crate::output::{try_normalize, GeneratedCode};
use crate::pipeline::Reformatter;

/// Default retry bound
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Which step of an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The agent raised an error
    Agent,
    /// The re-format request raised an error
    Reformat,
    /// The re-formatted text did not normalize into a record
    Malformed,
}

impl FailureKind {
    fn outcome_label(self) -> &'static str {
        match self {
            FailureKind::Agent => "agent_error",
            FailureKind::Reformat => "reformat_error",
            FailureKind::Malformed => "malformed",
        }
    }
}

/// One failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// 1-based attempt number
    pub attempt: usize,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one round, with the attempts that led to it
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub record: Option<GeneratedCode>,
    /// Attempts made, including the successful one
    pub attempts: usize,
    pub failures: Vec<AttemptFailure>,
    pub trace_id: String,
}

/// Drives the bounded retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    max_attempts: usize,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl Generator {
    /// A bound of 0 is treated as 1
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Produce a record for `prompt`, or `None` once the bound is spent
    pub async fn generate(
        &self,
        agent: &dyn Agent,
        prompt: &str,
        pipeline: &dyn Reformatter,
    ) -> Option<GeneratedCode> {
        self.generate_with_report(agent, prompt, pipeline).await.record
    }

    /// Like [`Generator::generate`], also returning per-attempt failures
    pub async fn generate_with_report(
        &self,
        agent: &dyn Agent,
        prompt: &str,
        pipeline: &dyn Reformatter,
    ) -> GenerationReport {
        let trace_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "generate",
            trace_id = %trace_id,
            max_attempts = self.max_attempts,
            otel.name = "generate"
        );

        async {
            let mut failures = Vec::new();

            for attempt in 1..=self.max_attempts {
                let attempt_span = info_span!("attempt", trace_id = %trace_id, attempt);
                let outcome = attempt_once(agent, prompt, pipeline)
                    .instrument(attempt_span)
                    .await;

                match outcome {
                    Ok(record) => {
                        GENERATION_ATTEMPTS.with_label_values(&["success"]).inc();
                        GENERATIONS.with_label_values(&["success"]).inc();
                        info!(trace_id = %trace_id, attempt, filename = record.filename(), "Generated code");
                        return GenerationReport {
                            record: Some(record),
                            attempts: attempt,
                            failures,
                            trace_id: trace_id.clone(),
                        };
                    }
                    Err((kind, message)) => {
                        GENERATION_ATTEMPTS.with_label_values(&[kind.outcome_label()]).inc();
                        warn!(trace_id = %trace_id, attempt, kind = ?kind, error = %message, "Error occurred, retry");
                        failures.push(AttemptFailure { attempt, kind, message });
                    }
                }
            }

            GENERATIONS.with_label_values(&["exhausted"]).inc();
            warn!(trace_id = %trace_id, attempts = self.max_attempts, "Retry budget exhausted");
            GenerationReport {
                record: None,
                attempts: self.max_attempts,
                failures,
                trace_id: trace_id.clone(),
            }
        }
        .instrument(span)
        .await
    }
}

async fn attempt_once(
    agent: &dyn Agent,
    prompt: &str,
    pipeline: &dyn Reformatter,
) -> Result<GeneratedCode, (FailureKind, String)> {
    let answer = agent
        .query(prompt)
        .await
        .map_err(|e| (FailureKind::Agent, e.to_string()))?;
    let reformatted = pipeline
        .reformat(&answer)
        .await
        .map_err(|e| (FailureKind::Reformat, e.to_string()))?;
    try_normalize(&reformatted).map_err(|e| (FailureKind::Malformed, e.to_string()))
}
