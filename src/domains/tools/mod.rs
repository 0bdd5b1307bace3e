//! Tools domain module.
//!
//! This module handles all tool-related functionality for the MCP server.
//! Tools are executable functions that can be called by MCP clients to perform
//! specific actions or computations.
//!
//! ## Architecture
//!
//! - `schema.rs` - Parameter declarations and argument validation
//! - `handlers.rs` - The `ToolHandler` trait, call context and result envelope
//! - `registry.rs` - Central tool registry: registration, listing and dispatch
//! - `definitions/` - Built-in tool implementations (one file per tool)
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `definitions/` (e.g., `my_tool.rs`)
//! 2. Implement `ToolHandler` and a `definition()` constructor declaring its parameters
//! 3. Register it in `definitions::register_builtin_tools`
//!
//! **No need to modify `server.rs`!** Listing and dispatch go through the registry.

pub mod definitions;
mod error;
mod handlers;
mod registry;
pub mod schema;

pub use definitions::{build_registry, register_builtin_tools};
pub use error::{RegistrationError, ToolError, ValidationError};
pub use handlers::*;
pub use registry::{ToolDefinition, ToolDescriptor, ToolRegistry};
pub use schema::{ArgumentSet, ArgumentValue, ParameterKind, ParameterSpec};
