//! Agent controller - the tool-calling loop behind [`Agent::query`]
//!
//! A [`CodeAgent`] is built once per process with [`CodeAgentBuilder`] and is
//! immutable afterwards: same model, same context, same tools on every call.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::Agent;
use crate::metrics::{LLM_CALL_TIME, TOOL_CALLS};
use crate::ollama::{parse_tool_calls_from_text, ChatClient, ChatMessage, OllamaError, Tool, ToolCall};
use crate::prompts;
use crate::tools::{ToolSet, CODE_READER_TOOL, RETRIEVAL_TOOL};

/// Default bound on LLM calls per query
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Result of one agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Final answer from the LLM
    pub final_response: String,
    /// Number of LLM calls made
    pub iterations: usize,
    /// Number of tool calls executed
    pub tool_calls_made: usize,
    /// Unique trace ID for this run
    pub trace_id: String,
}

/// Error type for agent operations
#[derive(Debug)]
pub enum AgentError {
    /// The model kept calling tools past the iteration bound
    MaxIterationsReached(usize),
    /// Ollama chat error
    Ollama(OllamaError),
    /// The model finished without any answer text
    EmptyAnswer,
    /// The builder was given an unusable configuration
    InvalidConfig(String),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::MaxIterationsReached(n) => write!(f, "Maximum iterations reached ({})", n),
            AgentError::Ollama(e) => write!(f, "Ollama error: {}", e),
            AgentError::EmptyAnswer => write!(f, "Agent returned an empty answer"),
            AgentError::InvalidConfig(msg) => write!(f, "Invalid agent configuration: {}", msg),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<OllamaError> for AgentError {
    fn from(e: OllamaError) -> Self {
        AgentError::Ollama(e)
    }
}

/// Builder for [`CodeAgent`]
///
/// All fields are checked in [`CodeAgentBuilder::build`]; an agent that
/// exists is always usable.
pub struct CodeAgentBuilder {
    chat_client: ChatClient,
    model: Option<String>,
    context: Option<String>,
    tools: Option<ToolSet>,
    max_iterations: usize,
}

impl CodeAgentBuilder {
    pub fn new(chat_client: ChatClient) -> Self {
        Self {
            chat_client,
            model: None,
            context: None,
            tools: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Operating context; empty or unset falls back to the built-in one
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn tools(mut self, tools: ToolSet) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validate and produce the agent
    ///
    /// # Returns
    /// `AgentError::InvalidConfig` if the model name is empty, the tool set
    /// lacks the reader or the retrieval tool, or `max_iterations` is 0
    pub fn build(self) -> Result<CodeAgent, AgentError> {
        let model = self
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AgentError::InvalidConfig("model name is empty".to_string()))?;

        let tools = self
            .tools
            .ok_or_else(|| AgentError::InvalidConfig("no tools given".to_string()))?;
        for required in [CODE_READER_TOOL, RETRIEVAL_TOOL] {
            if !tools.contains(required) {
                return Err(AgentError::InvalidConfig(format!("missing tool '{}'", required)));
            }
        }

        if self.max_iterations == 0 {
            return Err(AgentError::InvalidConfig("max_iterations must be at least 1".to_string()));
        }

        let context = match self.context.filter(|c| !c.trim().is_empty()) {
            Some(context) => context,
            None => prompts::get_context(None)
                .map_err(|e| AgentError::InvalidConfig(format!("default context unavailable: {}", e)))?,
        };

        Ok(CodeAgent {
            chat_client: self.chat_client,
            model,
            context,
            tools,
            max_iterations: self.max_iterations,
        })
    }
}

/// Tool-using reasoning agent (the session of one process run)
pub struct CodeAgent {
    chat_client: ChatClient,
    model: String,
    context: String,
    tools: ToolSet,
    max_iterations: usize,
}

impl CodeAgent {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// System message: the operating context followed by the tool list
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.context.trim_end().to_string();
        prompt.push_str("\n\nYou can call these tools:\n");
        for tool in self.tools.definitions() {
            prompt.push_str(&format!("- {}: {}\n", tool.function.name, tool.function.description));
        }
        prompt
    }

    /// Native tool calls if present, else calls to known tools found in the text
    fn tool_calls(&self, message: &ChatMessage) -> Vec<ToolCall> {
        match message.tool_calls.clone().filter(|tc| !tc.is_empty()) {
            Some(calls) => calls,
            None => parse_tool_calls_from_text(&message.content)
                .into_iter()
                .filter(|call| self.tools.contains(&call.function.name))
                .collect(),
        }
    }

    /// Run the agent loop for a prompt
    ///
    /// # Arguments
    /// * `prompt` - The operator's prompt
    ///
    /// # Returns
    /// AgentResult with the final answer and loop statistics
    pub async fn run(&self, prompt: &str) -> Result<AgentResult, AgentError> {
        let trace_id = Uuid::now_v7().to_string();

        let root_span = info_span!(
            "agent_task",
            trace_id = %trace_id,
            model = %self.model,
            otel.name = "agent_task"
        );

        async {
            info!(trace_id = %trace_id, prompt_len = prompt.len(), "Starting agent task");

            let tools: Vec<Tool> = self.tools.definitions();
            let mut messages = vec![ChatMessage::system(self.system_prompt()), ChatMessage::user(prompt)];
            let mut tool_calls_made = 0;

            for iteration in 1..=self.max_iterations {
                let llm_span = info_span!(
                    "llm_call",
                    trace_id = %trace_id,
                    iteration,
                    model = %self.model,
                    otel.name = "llm_call"
                );

                let call_start = Instant::now();
                let response = self
                    .chat_client
                    .chat(&messages, &self.model, Some(tools.as_slice()))
                    .instrument(llm_span)
                    .await?;
                let call_duration = call_start.elapsed().as_secs_f64();
                LLM_CALL_TIME.with_label_values(&[&self.model]).observe(call_duration);
                debug!(trace_id = %trace_id, iteration, duration_ms = call_duration * 1000.0, "LLM call completed");

                let tool_calls = self.tool_calls(&response.message);
                messages.push(response.message.clone());

                if tool_calls.is_empty() {
                    let answer = response.message.content.trim();
                    if answer.is_empty() {
                        warn!(trace_id = %trace_id, iteration, "Agent finished without an answer");
                        return Err(AgentError::EmptyAnswer);
                    }
                    info!(trace_id = %trace_id, iterations = iteration, tool_calls = tool_calls_made, "Agent task completed");
                    return Ok(AgentResult {
                        final_response: answer.to_string(),
                        iterations: iteration,
                        tool_calls_made,
                        trace_id: trace_id.clone(),
                    });
                }

                for tool_call in tool_calls {
                    let name = tool_call.function.name;
                    tool_calls_made += 1;
                    let label = if self.tools.contains(&name) { name.as_str() } else { "unknown" };
                    TOOL_CALLS.with_label_values(&[label]).inc();

                    let tool_span = info_span!(
                        "tool_call",
                        trace_id = %trace_id,
                        tool = %name,
                        otel.name = "tool_call"
                    );

                    let observation = match self
                        .tools
                        .invoke(&name, &tool_call.function.arguments)
                        .instrument(tool_span)
                        .await
                    {
                        Ok(output) => {
                            debug!(trace_id = %trace_id, tool = %name, output_len = output.len(), "Tool call succeeded");
                            output
                        }
                        Err(e) => {
                            warn!(trace_id = %trace_id, tool = %name, error = %e, "Tool call failed");
                            format!("Error: {}", e)
                        }
                    };

                    messages.push(ChatMessage::tool(observation));
                }
            }

            warn!(trace_id = %trace_id, max_iterations = self.max_iterations, "Max iterations reached");
            Err(AgentError::MaxIterationsReached(self.max_iterations))
        }
        .instrument(root_span)
        .await
    }
}

#[async_trait]
impl Agent for CodeAgent {
    async fn query(&self, prompt: &str) -> Result<String, AgentError> {
        Ok(self.run(prompt).await?.final_response)
    }
}
