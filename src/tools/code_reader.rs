//! File-reading tool bounded to one root directory

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{string_arg, AgentTool, ToolDescriptor, ToolError, CODE_READER_TOOL};

/// Reads the full text of a file under `root`
///
/// The tool never fails towards the agent: the answer is always a JSON
/// object, either `{"file_content": ...}` or `{"error": ...}`.
pub struct CodeReader {
    root: PathBuf,
    descriptor: ToolDescriptor,
}

impl CodeReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            descriptor: ToolDescriptor::new(
                CODE_READER_TOOL,
                "Reads the code for the parser",
                json!({
                    "type": "object",
                    "properties": {
                        "file_name": {
                            "type": "string",
                            "description": "Name of the file to read, relative to the document directory"
                        }
                    },
                    "required": ["file_name"]
                }),
            ),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `file_name` to a canonical path inside the root
    ///
    /// Absolute paths and `..` components are rejected before touching the
    /// filesystem; the canonical result must still start with the canonical
    /// root, which also catches symlinks pointing outside.
    pub async fn resolve(&self, file_name: &str) -> Result<PathBuf, ToolError> {
        let relative = Path::new(file_name);
        if file_name.trim().is_empty() || relative.is_absolute() {
            return Err(ToolError::InvalidPath(file_name.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(ToolError::PathEscapesRoot(file_name.to_string())),
            }
        }

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|source| ToolError::Io {
                path: self.root.clone(),
                source,
            })?;
        let candidate = root.join(relative);
        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|source| ToolError::Io {
                path: candidate.clone(),
                source,
            })?;

        if !resolved.starts_with(&root) {
            return Err(ToolError::PathEscapesRoot(file_name.to_string()));
        }
        Ok(resolved)
    }

    /// Read the file named `file_name`
    pub async fn read(&self, file_name: &str) -> Result<String, ToolError> {
        let path = self.resolve(file_name).await?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ToolError::Io { path, source })
    }
}

#[async_trait]
impl AgentTool for CodeReader {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: &Value) -> Result<String, ToolError> {
        let file_name = string_arg(args, CODE_READER_TOOL, &["file_name", "path", "input"])?;
        let answer = match self.read(file_name).await {
            Ok(content) => {
                debug!(file_name, bytes = content.len(), "code_reader read file");
                json!({ "file_content": content })
            }
            Err(e) => {
                warn!(file_name, error = %e, "code_reader refused or failed");
                json!({ "error": e.to_string() })
            }
        };
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_with_file() -> (tempfile::TempDir, CodeReader) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/inject.py"), "print('hi')\n").unwrap();
        let reader = CodeReader::new(dir.path());
        (dir, reader)
    }

    #[tokio::test]
    async fn test_reads_file_under_root() {
        let (_dir, reader) = reader_with_file();
        let answer = reader.call(&json!({"file_name": "src/inject.py"})).await.unwrap();
        let value: Value = serde_json::from_str(&answer).unwrap();
        assert_eq!(value["file_content"], "print('hi')\n");
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let (_dir, reader) = reader_with_file();
        for name in ["../../etc/passwd", "src/../../secret", "/etc/passwd", ""] {
            let answer = reader.call(&json!({ "file_name": name })).await.unwrap();
            let value: Value = serde_json::from_str(&answer).unwrap();
            assert!(value.get("file_content").is_none(), "{} leaked content", name);
            assert!(value["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_error_value() {
        let (_dir, reader) = reader_with_file();
        assert!(matches!(reader.read("nope.txt").await, Err(ToolError::Io { .. })));
        let answer = reader.call(&json!({"file_name": "nope.txt"})).await.unwrap();
        assert!(answer.contains("\"error\""));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_outside_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let (dir, reader) = reader_with_file();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt")).unwrap();

        assert!(matches!(
            reader.resolve("link.txt").await,
            Err(ToolError::PathEscapesRoot(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_argument_is_error() {
        let (_dir, reader) = reader_with_file();
        assert!(matches!(
            reader.call(&json!({})).await,
            Err(ToolError::MissingArgument { argument: "file_name", .. })
        ));
    }
}
