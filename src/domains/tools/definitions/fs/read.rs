//! File read tool definition.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, instrument, warn};

use crate::core::config::Config;
use crate::core::security::validate_path;
use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

/// File read tool - returns the contents of a file inside the sandbox.
pub struct FileReadTool {
    config: Arc<Config>,
}

impl FileReadTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "file_read";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Read the contents of a file. Text is returned as UTF-8; use encoding 'base64' for binary files.";

    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Build the registry entry for this tool.
    pub fn definition(config: Arc<Config>) -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self::new(config)).params([
            ParameterSpec::string("path")
                .required()
                .describe("Path to the file to read"),
            ParameterSpec::string("encoding")
                .describe("How to return the content")
                .one_of(["utf8", "base64"])
                .with_default("utf8"),
            ParameterSpec::number("max_bytes")
                .describe("Only return the first N bytes of the file"),
        ])
    }
}

#[async_trait]
impl ToolHandler for FileReadTool {
    #[instrument(name = "file_read", skip_all)]
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        let path_arg = args.require_str("path")?;
        let encoding = args.str("encoding").unwrap_or("utf8");
        let max_bytes = args.unsigned("max_bytes")?;

        let path = validate_path(path_arg, &self.config).map_err(|e| {
            warn!("Path security validation failed: {}", e);
            ToolError::execution_failed(format!("Path security validation failed: {}", e))
        })?;

        if path.is_dir() {
            return Err(ToolError::execution_failed(format!(
                "Path is a directory: {}",
                path_arg
            )));
        }

        let (bytes, total) = ctx
            .run(read_prefix(&path, max_bytes))
            .await?
            .map_err(|e| ToolError::execution_failed(format!("Failed to read {}: {}", path_arg, e)))?;
        let read = bytes.len();
        let truncated = (read as u64) < total;

        let mut content = match encoding {
            "base64" => BASE64.encode(&bytes),
            _ => match String::from_utf8(bytes) {
                Ok(text) => text,
                // A cut may land inside a multi-byte sequence; keep the valid prefix.
                Err(e) if truncated && e.utf8_error().error_len().is_none() => {
                    let valid = e.utf8_error().valid_up_to();
                    let mut bytes = e.into_bytes();
                    bytes.truncate(valid);
                    String::from_utf8(bytes).map_err(|e| ToolError::internal(e.to_string()))?
                }
                Err(_) => {
                    return Err(ToolError::execution_failed(format!(
                        "File is not valid UTF-8: {} (use encoding 'base64')",
                        path_arg
                    )));
                }
            },
        };

        if truncated {
            content.push_str(&format!(
                "\n\n[truncated: showing {} of {} bytes]",
                max_bytes.unwrap_or_default(),
                total
            ));
        }

        info!("Read {} of {} bytes from {}", read, total, path_arg);
        Ok(content)
    }
}

/// Read at most `limit` bytes from the start of `path`, plus the file size.
async fn read_prefix(path: &Path, limit: Option<u64>) -> std::io::Result<(Vec<u8>, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let total = file.metadata().await?.len();

    let mut bytes = Vec::new();
    match limit {
        Some(limit) => (&mut file).take(limit).read_to_end(&mut bytes).await?,
        None => file.read_to_end(&mut bytes).await?,
    };
    // The file may have grown since the metadata call
    let total = total.max(bytes.len() as u64);
    Ok((bytes, total))
}
