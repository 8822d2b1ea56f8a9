//! Prometheus metrics for the generation pipeline
//!
//! Counters and histograms live in the default registry. They can be dumped in
//! the text exposition format with [`render`], e.g. into a node-exporter
//! textfile when the interactive loop exits.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Generation Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Generation attempts by outcome.
    ///
    /// Labels:
    /// - outcome: "success", "agent_error", "reformat_error", "malformed"
    pub static ref GENERATION_ATTEMPTS: CounterVec = register_counter_vec!(
        "attck_pe_generation_attempts_total",
        "Generation attempts by outcome",
        &["outcome"]
    ).expect("failed to register GENERATION_ATTEMPTS metric");

    /// Completed prompt rounds.
    ///
    /// Labels:
    /// - status: "success" or "exhausted"
    pub static ref GENERATIONS: CounterVec = register_counter_vec!(
        "attck_pe_generations_total",
        "Prompt rounds by final status",
        &["status"]
    ).expect("failed to register GENERATIONS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tool invocations made by the reasoning agent.
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "attck_pe_tool_calls_total",
        "Tool invocations by the reasoning agent",
        &["tool"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Wall-clock time of individual LLM requests.
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "attck_pe_llm_call_duration_seconds",
        "Duration of LLM requests",
        &["model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 360.0]
    ).expect("failed to register LLM_CALL_TIME metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Persistence Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// File writes of generated code.
    ///
    /// Labels:
    /// - status: "success" or "error"
    pub static ref SAVES: CounterVec = register_counter_vec!(
        "attck_pe_saves_total",
        "Generated code files written",
        &["status"]
    ).expect("failed to register SAVES metric");
}

/// Encode every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
