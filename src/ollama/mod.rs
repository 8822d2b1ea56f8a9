//! Ollama LLM integration module
//!
//! This module provides clients for Ollama's HTTP API: text generation,
//! chat with tool calling, embeddings, and model unloading.

pub mod client;
pub mod tool_use;

// Re-export public types from the client modules
pub use client::{GenerateResponse, OllamaClient, OllamaError};
pub use tool_use::{
    parse_tool_calls_from_text, ChatClient, ChatMessage, ChatResponse, FunctionCall, Tool, ToolCall,
    ToolFunction,
};

/// Default address of a local Ollama server
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
