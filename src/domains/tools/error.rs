//! Tool-specific error types.

use thiserror::Error;

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not registered.
    #[error("Tool not found: '{0}' is not registered")]
    NotFound(String),

    /// Invalid arguments were provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Arguments failed schema validation.
    #[error("Invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    /// The tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The call was cancelled before the tool finished.
    #[error("Tool execution cancelled")]
    Cancelled,

    /// The tool timed out during execution.
    #[error("Tool execution timed out")]
    Timeout,

    /// The tool panicked while executing.
    #[error("Tool panicked: {0}")]
    Panicked(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "invalid arguments" error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a new "internal" error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        Self::ExecutionFailed(e.to_string())
    }
}

/// Per-call argument validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required parameter was absent.
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    /// A parameter had the wrong JSON shape.
    #[error("parameter '{name}' must be a {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A string parameter was outside its allowed set.
    #[error("invalid value '{value}' for parameter '{name}' (allowed: {})", allowed.join(", "))]
    InvalidEnumValue {
        name: String,
        value: String,
        allowed: Vec<String>,
    },

    /// The raw arguments were not a JSON object.
    #[error("arguments must be a JSON object")]
    NotAnObject,
}

/// Startup errors raised while populating a registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A tool with this name is already registered.
    #[error("tool '{0}' is already registered")]
    DuplicateName(String),

    /// The definition is malformed.
    #[error("invalid definition for tool '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },
}

impl RegistrationError {
    /// Create a new "invalid definition" error.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
