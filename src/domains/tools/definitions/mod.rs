//! Tool definitions module.
//!
//! This module exports all built-in tool definitions and registers them.
//! Each tool is defined in its own file for better maintainability.

pub mod calculator;
pub mod db;
pub mod fs;
pub mod net;

pub use calculator::CalculatorTool;
pub use db::DatabaseQueryTool;
pub use fs::{DirScanTool, FileReadTool, FileWriteTool};
pub use net::{HttpFetchTool, NetworkPingTool, PortScanTool, WebSearchTool};

use std::sync::Arc;
use tracing::info;

use super::ToolRegistry;
use crate::core::config::Config;
use crate::core::error::Result;

/// Register every built-in tool.
///
/// The database tool is only added when a database path is configured.
/// Any failure here is a startup error.
pub fn register_builtin_tools(registry: &mut ToolRegistry, config: Arc<Config>) -> Result<()> {
    registry.register(CalculatorTool::definition())?;
    registry.register(FileReadTool::definition(config.clone()))?;
    registry.register(FileWriteTool::definition(config.clone()))?;
    registry.register(DirScanTool::definition(config.clone()))?;
    registry.register(HttpFetchTool::definition(config.clone())?)?;
    registry.register(WebSearchTool::definition(config.clone())?)?;
    registry.register(NetworkPingTool::definition(config.clone()))?;
    registry.register(PortScanTool::definition(config.clone()))?;

    if let Some(path) = &config.database.path {
        let tool = DatabaseQueryTool::open(path, config.database.allow_raw)?;
        registry.register(tool.definition())?;
    } else {
        info!("MCP_DATABASE_PATH not set - database_query tool disabled");
    }

    Ok(())
}

/// Create a registry holding the built-in tools.
pub fn build_registry(config: Arc<Config>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, config)?;
    info!("Tool registry ready with {} tools", registry.len());
    Ok(registry)
}
