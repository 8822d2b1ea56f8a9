//! Retrieval tool backed by the document index

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{string_arg, AgentTool, ToolDescriptor, ToolError, RETRIEVAL_TOOL};
use crate::index::QueryEngine;

/// Exposes a [`QueryEngine`] to the agent as `code_generation`
pub struct RetrievalTool {
    engine: Arc<dyn QueryEngine>,
    descriptor: ToolDescriptor,
}

impl RetrievalTool {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self {
            engine,
            descriptor: ToolDescriptor::new(
                RETRIEVAL_TOOL,
                "This generates Red Team Code",
                json!({
                    "type": "object",
                    "properties": {
                        "input": {
                            "type": "string",
                            "description": "Natural-language query answered from the reference documents"
                        }
                    },
                    "required": ["input"]
                }),
            ),
        }
    }
}

#[async_trait]
impl AgentTool for RetrievalTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: &Value) -> Result<String, ToolError> {
        let query = string_arg(args, RETRIEVAL_TOOL, &["input", "query"])?;
        debug!(query, "Querying document index");
        Ok(self.engine.query(query).await?)
    }
}
