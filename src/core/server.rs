//! MCP Server implementation and lifecycle management.
//!
//! This module contains the main server handler that implements the MCP
//! protocol by delegating to the tool registry.
//!
//! ## Tool Architecture
//!
//! Tools are defined in `domains/tools/definitions/` with one file per tool
//! and collected into a [`ToolRegistry`] at startup. `tools/list` and
//! `tools/call` both go through the registry, whichever transport carries
//! them. **Adding a new tool does NOT require modifying this file!**

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use super::config::Config;
use super::error::Result;
use crate::domains::tools::{ToolContext, ToolRegistry, ToolResult, build_registry};

/// The main MCP server handler.
///
/// Cloning is cheap: the configuration and registry are shared.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Registered tools, immutable after startup.
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create a server with every built-in tool registered.
    ///
    /// Fails if a tool cannot be registered, e.g. the database cannot be opened.
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let registry = build_registry(config.clone())?;
        Ok(Self::with_registry(config, registry))
    }

    /// Create a server around an already populated registry.
    pub fn with_registry(config: Arc<Config>, registry: ToolRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Get the tool registry.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    // ========================================================================
    // JSON-RPC Transport Support Methods
    // ========================================================================

    /// List all available tools as MCP JSON (for HTTP transport).
    pub fn list_tools_json(&self) -> Vec<Value> {
        self.registry
            .list_tools()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect()
    }

    /// Call a tool by name and render the MCP result (for HTTP transport).
    pub async fn call_tool_json(&self, name: &str, arguments: &Value, ctx: ToolContext) -> Value {
        self.registry.invoke_json(name, arguments, ctx).await.to_json()
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "General-purpose tool server: arithmetic, sandboxed file access, HTTP, web search, network probes and SQLite queries."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.server.name.clone(),
                version: self.config.server.version.clone(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }

    #[instrument(skip(self, _request, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        info!("Listing tools");
        Ok(ListToolsResult {
            tools: self.registry.list_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, request, context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let ctx = ToolContext::with_cancellation(context.ct.clone());
        let result: ToolResult = self
            .registry
            .invoke(&request.name, request.arguments.as_ref(), ctx)
            .await;
        Ok(result.into_call_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server() -> McpServer {
        McpServer::new(Config::default()).unwrap()
    }

    #[test]
    fn test_server_identity() {
        let server = server();
        assert_eq!(server.name(), "toolbox-mcp-server");
        assert_eq!(server.version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_get_info_advertises_tools_only() {
        let info = server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
        assert!(info.capabilities.prompts.is_none());
        assert_eq!(info.server_info.name, "toolbox-mcp-server");
    }

    #[test]
    fn test_list_tools_json() {
        let tools = server().list_tools_json();
        let calculator = tools
            .iter()
            .find(|t| t["name"] == "calculator")
            .unwrap();
        assert_eq!(calculator["inputSchema"]["type"], "object");
        assert!(calculator["inputSchema"]["properties"]["operation"].is_object());
    }

    #[tokio::test]
    async fn test_call_tool_json() {
        let server = server();
        let ok = server
            .call_tool_json(
                "calculator",
                &json!({ "operation": "add", "x": 2, "y": 3 }),
                ToolContext::new(),
            )
            .await;
        assert_eq!(ok["isError"], false);
        assert_eq!(ok["content"][0]["text"], "2 + 3 = 5");

        let missing = server
            .call_tool_json("nonexistent_tool", &json!({}), ToolContext::new())
            .await;
        assert_eq!(missing["isError"], true);
        assert!(
            missing["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("not registered")
        );
    }
}
