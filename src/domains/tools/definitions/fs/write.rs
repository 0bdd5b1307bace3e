//! File write tool definition.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::core::config::Config;
use crate::core::security::validate_write_path;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

/// File write tool - creates, overwrites or appends to a file.
pub struct FileWriteTool {
    config: Arc<Config>,
}

impl FileWriteTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "file_write";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Write text content to a file, either replacing it or appending to it. Missing parent directories can be created on request.";

    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(config)).params([
            ParameterSpec::string("path")
                .required()
                .describe("Path of the file to write"),
            ParameterSpec::string("content")
                .required()
                .describe("Text to write"),
            ParameterSpec::string("mode")
                .describe("Replace the file or add to its end")
                .one_of(["overwrite", "append"])
                .with_default("overwrite"),
            ParameterSpec::boolean("create_dirs")
                .describe("Create missing parent directories")
                .with_default(false),
        ])
    }
}

#[async_trait]
impl ToolHandler for FileWriteTool {
    #[instrument(name = "file_write", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let path_arg = args.require_str("path")?;
        let content = args.require_str("content")?;
        let append = args.str("mode") == Some("append");

        let path = validate_write_path(path_arg, &self.config).map_err(|e| {
            warn!("Path security validation failed: {}", e);
            ToolError::execution_failed(format!("Path security validation failed: {}", e))
        })?;

        if path.is_dir() {
            return Err(ToolError::execution_failed(format!(
                "Path is a directory: {}",
                path_arg
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if !args.flag("create_dirs") {
                    return Err(ToolError::execution_failed(format!(
                        "Parent directory does not exist: {} (set create_dirs to create it)",
                        parent.display()
                    )));
                }
                tokio::fs::create_dir_all(parent).await?;
                info!("Created directory {}", parent.display());
            }
        }

        let write = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(&path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await
        };
        ctx.run(write).await?.map_err(|e| {
            ToolError::execution_failed(format!("Failed to write {}: {}", path_arg, e))
        })?;

        let verb = if append { "Appended" } else { "Wrote" };
        info!("{} {} bytes to {}", verb, content.len(), path_arg);
        Ok(format!("{} {} bytes to {}", verb, content.len(), path_arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::ArgumentValue;
    use std::fs;
    use tempfile::TempDir;

    fn tool() -> FileWriteTool {
        FileWriteTool::new(Arc::new(Config::default()))
    }

    fn args(pairs: &[(&str, ArgumentValue)]) -> ArgumentSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_write_then_append() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("log.txt");
        let path = file.display().to_string();

        let text = tool()
            .call(
                args(&[("path", path.clone().into()), ("content", "first\n".into())]),
                ToolContext::new(),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Wrote 6 bytes"));

        let text = tool()
            .call(
                args(&[
                    ("path", path.into()),
                    ("content", "second\n".into()),
                    ("mode", "append".into()),
                ]),
                ToolContext::new(),
            )
            .await
            .unwrap();
        assert!(text.starts_with("Appended 7 bytes"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("data.txt");
        fs::write(&file, "a much longer original body").unwrap();

        tool()
            .call(
                args(&[
                    ("path", file.display().to_string().into()),
                    ("content", "short".into()),
                ]),
                ToolContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "short");
    }

    #[tokio::test]
    async fn test_missing_parent_requires_create_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a").join("b").join("out.txt");
        let path = file.display().to_string();

        let err = tool()
            .call(
                args(&[("path", path.clone().into()), ("content", "x".into())]),
                ToolContext::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("create_dirs"));

        tool()
            .call(
                args(&[
                    ("path", path.into()),
                    ("content", "x".into()),
                    ("create_dirs", true.into()),
                ]),
                ToolContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_write_outside_root_rejected() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();

        let mut config = Config::default();
        config.security.root_path = Some(root.path().to_path_buf());
        let tool = FileWriteTool::new(Arc::new(config));

        let target = outside.path().join("escape.txt");
        let err = tool
            .call(
                args(&[
                    ("path", target.display().to_string().into()),
                    ("content", "nope".into()),
                ]),
                ToolContext::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Path security validation failed"));
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_to_missing_file_outside_root_rejected() {
        use crate::domains::tools::{ToolRegistry, ToolResult};
        use serde_json::json;
        use std::os::unix::fs::symlink;

        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let link = root.path().join("link.txt");
        let target = outside.path().join("created.txt");
        symlink(&target, &link).unwrap();

        for allow_symlinks in [false, true] {
            let mut config = Config::default();
            config.security.root_path = Some(root.path().to_path_buf());
            config.security.allow_symlinks = allow_symlinks;

            let mut registry = ToolRegistry::new();
            registry
                .register(FileWriteTool::definition(Arc::new(config)))
                .unwrap();

            let result = registry
                .invoke_json(
                    FileWriteTool::NAME,
                    &json!({ "path": link.display().to_string(), "content": "escaped" }),
                    ToolContext::new(),
                )
                .await;
            assert!(matches!(result, ToolResult::Failure { .. }));
            assert!(!target.exists());
        }
    }
}
