//! Ollama Chat API with tool calling support
//!
//! This module provides a client for Ollama's `/api/chat` endpoint,
//! which supports tool/function calling for agentic workflows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client::{check_status, http_client, OllamaError};

/// A message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant", "tool"
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

/// Function call details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

impl Tool {
    /// Define a function tool
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function definition for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Response from /api/chat
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub done: bool,
    #[serde(default)]
    pub eval_count: u32,
    #[serde(default)]
    pub eval_duration: u64,
}

/// Client for Ollama's /api/chat endpoint with tool support
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a chat client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OllamaError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(Some(timeout))?,
        })
    }

    /// Send a chat request with optional tools
    ///
    /// # Arguments
    /// * `messages` - The conversation history
    /// * `model` - The model name (e.g., "red-team-expert:latest")
    /// * `tools` - Optional list of tools the model can use
    ///
    /// # Returns
    /// ChatResponse containing the model's reply and any tool calls
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: &str,
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, OllamaError> {
        let endpoint = format!("{}/api/chat", self.base_url);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": 0.0
            }
        });

        if let Some(t) = tools {
            body["tools"] = serde_json::to_value(t)?;
        }

        let response = self.client.post(&endpoint).json(&body).send().await?;

        let text = check_status(response).await?.text().await?;

        if text.is_empty() {
            return Err(OllamaError::EmptyResponse);
        }

        let value: serde_json::Value = serde_json::from_str(&text)?;
        if let Some(err) = value["error"].as_str() {
            return Err(OllamaError::Server(err.to_string()));
        }

        let chat_response: ChatResponse = serde_json::from_value(value)?;
        Ok(chat_response)
    }
}

/// Try to parse tool calls from the response content text
///
/// This handles models that output tool calls as JSON in the text
/// instead of using the native tool_calls field.
pub fn parse_tool_calls_from_text(content: &str) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();

    let content = content.trim();

    // Try parsing the entire content as a tool call
    if let Some(tool_call) = try_parse_tool_call(content) {
        tool_calls.push(tool_call);
        return tool_calls;
    }

    // Look for top-level {...} objects within the text
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        if let Some(tool_call) = try_parse_tool_call(&content[s..=i]) {
                            tool_calls.push(tool_call);
                        }
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    tool_calls
}

/// Try to parse a single tool call from a JSON string
fn try_parse_tool_call(json_str: &str) -> Option<ToolCall> {
    let value = serde_json::from_str::<serde_json::Value>(json_str).ok()?;
    parse_tool_call_from_value(&value)
}

/// Parse a tool call from a JSON Value
///
/// Accepts `{"name": .., "arguments": ..}`, the `parameters` spelling some
/// models use, and the OpenAI-style `{"function": {..}}` wrapper. Arguments
/// given as a JSON-encoded string are decoded.
fn parse_tool_call_from_value(value: &serde_json::Value) -> Option<ToolCall> {
    if let Some(inner) = value.get("function").filter(|f| f.is_object()) {
        return parse_tool_call_from_value(inner);
    }

    let name = value.get("name").and_then(|n| n.as_str())?;

    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))?
        .clone();

    let arguments = match arguments {
        serde_json::Value::String(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
        other => other,
    };

    Some(ToolCall {
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_content_as_tool_call() {
        let calls = parse_tool_calls_from_text(r#"{"name": "code_reader", "arguments": {"file_name": "a.py"}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "code_reader");
        assert_eq!(calls[0].function.arguments["file_name"], "a.py");
    }

    #[test]
    fn test_parse_embedded_tool_calls() {
        let text = "I will look it up. {\"name\": \"code_generation\", \"parameters\": {\"input\": \"T1059\"}} then read {\"name\": \"code_reader\", \"arguments\": \"{\\\"file_name\\\": \\\"x\\\"}\"}";
        let calls = parse_tool_calls_from_text(text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.arguments["input"], "T1059");
        assert_eq!(calls[1].function.arguments["file_name"], "x");
    }

    #[test]
    fn test_parse_function_wrapper() {
        let calls = parse_tool_calls_from_text(
            r#"{"type": "function", "function": {"name": "code_reader", "arguments": {"file_name": "b"}}}"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "code_reader");
    }

    #[test]
    fn test_plain_text_has_no_tool_calls() {
        assert!(parse_tool_calls_from_text("Here is your script: print('hi')").is_empty());
        assert!(parse_tool_calls_from_text("} stray {").is_empty());
        assert!(parse_tool_calls_from_text("{'code': 'x'}").is_empty());
    }

    #[test]
    fn test_tool_definition_serialization() {
        let tool = Tool::function("code_reader", "Reads files", serde_json::json!({"type": "object"}));
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("\"type\":\"function\""));
        assert!(json.contains("\"name\":\"code_reader\""));
    }
}
