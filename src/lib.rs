//! Toolbox MCP Server Library
//!
//! A Model Context Protocol (MCP) server exposing a registry of tools:
//! named, schema-described operations that clients list and invoke.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, the path sandbox, the MCP
//!   server handler and the stdio/TCP/HTTP transports
//! - **domains::tools**: the tool registry (registration, argument
//!   validation, fault-isolated dispatch) and the built-in tools
//!
//! # Example
//!
//! ```rust,no_run
//! use toolbox_mcp_server::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let transport = TransportService::new(config.transport.clone());
//!     let server = McpServer::new(config)?;
//!     transport.run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
pub use domains::tools::{ToolContext, ToolRegistry, ToolResult};
