//! Tools exposed to the reasoning agent
//!
//! Exactly two tools exist for the lifetime of a session:
//! - [`CodeReader`] (`code_reader`) reads a file under the document root
//! - [`RetrievalTool`] (`code_generation`) answers queries from the document index
//!
//! Tools are stateless after construction and are shared behind `Arc`.

pub mod code_reader;
pub mod retrieval;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::index::IndexError;
use crate::ollama::Tool;

pub use code_reader::CodeReader;
pub use retrieval::RetrievalTool;

/// Name of the file-reading tool
pub const CODE_READER_TOOL: &str = "code_reader";

/// Name of the retrieval tool
pub const RETRIEVAL_TOOL: &str = "code_generation";

/// Name, description and argument schema of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Tool definition in the shape Ollama's `/api/chat` expects
    pub fn to_ollama(&self) -> Tool {
        Tool::function(&self.name, &self.description, self.parameters.clone())
    }
}

/// A capability the agent can invoke by name
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Invoke the tool with the arguments object chosen by the model
    async fn call(&self, args: &Value) -> Result<String, ToolError>;
}

/// Error type for tool invocations
#[derive(Debug)]
pub enum ToolError {
    /// A required argument is missing or not a string
    MissingArgument { tool: String, argument: &'static str },
    /// No tool with this name is registered
    UnknownTool(String),
    /// The requested path resolves outside the tool's root directory
    PathEscapesRoot(String),
    /// The requested path is absolute or otherwise unusable
    InvalidPath(String),
    /// Reading from disk failed
    Io { path: PathBuf, source: std::io::Error },
    /// The retrieval query failed
    Query(IndexError),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::MissingArgument { tool, argument } => {
                write!(f, "Tool '{}' requires a string argument '{}'", tool, argument)
            }
            ToolError::UnknownTool(name) => write!(f, "Unknown tool: {}", name),
            ToolError::PathEscapesRoot(path) => write!(f, "Path escapes the document root: {}", path),
            ToolError::InvalidPath(path) => write!(f, "Invalid path: {}", path),
            ToolError::Io { path, source } => write!(f, "Cannot read {}: {}", path.display(), source),
            ToolError::Query(e) => write!(f, "Query failed: {}", e),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<IndexError> for ToolError {
    fn from(e: IndexError) -> Self {
        ToolError::Query(e)
    }
}

/// Fetch a required string argument, accepting any of `names`
pub(crate) fn string_arg<'a>(
    args: &'a Value,
    tool: &str,
    names: &[&'static str],
) -> Result<&'a str, ToolError> {
    names
        .iter()
        .find_map(|name| args.get(*name).and_then(Value::as_str))
        .ok_or_else(|| ToolError::MissingArgument {
            tool: tool.to_string(),
            argument: names.first().copied().unwrap_or("input"),
        })
}

/// The reader and retrieval tools of one agent session
#[derive(Clone)]
pub struct ToolSet {
    reader: Arc<dyn AgentTool>,
    retrieval: Arc<dyn AgentTool>,
}

impl ToolSet {
    pub fn new(reader: Arc<dyn AgentTool>, retrieval: Arc<dyn AgentTool>) -> Self {
        Self { reader, retrieval }
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<dyn AgentTool>> {
        [&self.reader, &self.retrieval].into_iter()
    }

    /// Tool definitions passed to every chat request
    pub fn definitions(&self) -> Vec<Tool> {
        self.iter().map(|t| t.descriptor().to_ollama()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|t| t.descriptor().name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|t| t.descriptor().name == name)
    }

    /// Dispatch a call to the tool named `name`
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let tool = self
            .iter()
            .find(|t| t.descriptor().name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo(ToolDescriptor);

    #[async_trait]
    impl AgentTool for Echo {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }

        async fn call(&self, args: &Value) -> Result<String, ToolError> {
            Ok(format!("{}:{}", self.0.name, string_arg(args, &self.0.name, &["input"])?))
        }
    }

    fn echo(name: &str) -> Arc<dyn AgentTool> {
        Arc::new(Echo(ToolDescriptor::new(name, "echo", json!({"type": "object"}))))
    }

    #[tokio::test]
    async fn test_toolset_dispatches_by_name() {
        let tools = ToolSet::new(echo(CODE_READER_TOOL), echo(RETRIEVAL_TOOL));
        assert_eq!(tools.names(), vec![CODE_READER_TOOL, RETRIEVAL_TOOL]);
        assert!(tools.contains(RETRIEVAL_TOOL));
        assert!(!tools.contains("execute_code"));

        let out = tools.invoke(RETRIEVAL_TOOL, &json!({"input": "hi"})).await.unwrap();
        assert_eq!(out, "code_generation:hi");
    }

    #[tokio::test]
    async fn test_toolset_unknown_tool_and_missing_argument() {
        let tools = ToolSet::new(echo(CODE_READER_TOOL), echo(RETRIEVAL_TOOL));
        assert!(matches!(
            tools.invoke("rm", &json!({})).await,
            Err(ToolError::UnknownTool(name)) if name == "rm"
        ));
        assert!(matches!(
            tools.invoke(CODE_READER_TOOL, &json!({"other": 1})).await,
            Err(ToolError::MissingArgument { argument: "input", .. })
        ));
    }

    #[test]
    fn test_descriptor_to_ollama_definition() {
        let descriptor = ToolDescriptor::new("code_reader", "Reads code", json!({"type": "object"}));
        let tool = descriptor.to_ollama();
        assert_eq!(tool.tool_type, "function");
        assert_eq!(tool.function.name, "code_reader");
        assert_eq!(tool.function.description, "Reads code");
    }
}
