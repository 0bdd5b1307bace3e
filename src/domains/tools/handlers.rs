//! Tool handlers module.
//!
//! This module defines the seam between the registry and tool logic:
//! the [`ToolHandler`] trait, the per-call [`ToolContext`] and the uniform
//! [`ToolResult`] envelope every call resolves to.

use futures::future::BoxFuture;
use rmcp::model::{CallToolResult, Content};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::error::ToolError;
use super::schema::ArgumentSet;

/// Outcome of a single tool invocation.
///
/// A failure is an ordinary value, delivered to the caller as a normal
/// response, never as a transport-level error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Success { text: String },
    Failure { message: String },
}

impl ToolResult {
    /// Create a successful result.
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success { text: text.into() }
    }

    /// Create a failed result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The payload text, whichever variant this is.
    pub fn text(&self) -> &str {
        match self {
            Self::Success { text } => text,
            Self::Failure { message } => message,
        }
    }

    /// Convert to the MCP wire result, flagging failures with `isError`.
    pub fn into_call_result(self) -> CallToolResult {
        match self {
            Self::Success { text } => CallToolResult::success(vec![Content::text(text)]),
            Self::Failure { message } => CallToolResult::error(vec![Content::text(message)]),
        }
    }

    /// JSON shape used by the HTTP transport.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "content": [{ "type": "text", "text": self.text() }],
            "isError": self.is_failure()
        })
    }
}

impl From<Result<String, ToolError>> for ToolResult {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(text) => Self::success(text),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

// ============================================================================
// Execution Context
// ============================================================================

/// Per-call execution context carrying cancellation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    cancellation: CancellationToken,
}

impl ToolContext {
    /// A context that is never cancelled unless [`Self::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a cancellation token supplied by the transport.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Resolves once the call is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Drive `fut` to completion unless the call is cancelled first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ToolError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(ToolError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// Result type returned by handlers: the success text or a domain error.
pub type HandlerResult = Result<String, ToolError>;

/// Trait for tool logic bound to a registry entry.
///
/// Handlers receive arguments already validated against the tool's declared
/// parameters. Long-running work should observe `ctx` and stop promptly once
/// it is cancelled.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool.
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult;
}

/// Adapter turning a closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(ArgumentSet, ToolContext) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(ArgumentSet, ToolContext) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    async fn call(&self, args: ArgumentSet, ctx: ToolContext) -> HandlerResult {
        (self.0)(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tool_result_accessors() {
        let ok = ToolResult::success("done");
        assert!(ok.is_success());
        assert_eq!(ok.text(), "done");

        let err = ToolResult::failure("broken");
        assert!(err.is_failure());
        assert_eq!(err.text(), "broken");
    }

    #[test]
    fn test_into_call_result_flags_errors() {
        let result = ToolResult::failure("nope").into_call_result();
        assert_eq!(result.is_error, Some(true));

        let result = ToolResult::success("yes").into_call_result();
        assert_ne!(result.is_error, Some(true));
    }

    #[test]
    fn test_from_handler_result() {
        let r: ToolResult = Err::<String, _>(ToolError::execution_failed("boom")).into();
        assert_eq!(r, ToolResult::failure("Execution failed: boom"));
    }

    #[test]
    fn test_to_json_shape() {
        let json = ToolResult::failure("x").to_json();
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["text"], "x");
    }

    #[tokio::test]
    async fn test_context_run_cancelled() {
        let ctx = ToolContext::new();
        ctx.cancel();
        let out = ctx.run(tokio::time::sleep(Duration::from_secs(30))).await;
        assert!(matches!(out, Err(ToolError::Cancelled)));
    }

    #[tokio::test]
    async fn test_context_run_completes() {
        let ctx = ToolContext::new();
        let out = ctx.run(async { 7 }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[test]
    fn test_fn_handler() {
        use futures::FutureExt;

        let handler = FnHandler::new(|args: ArgumentSet, _ctx: ToolContext| {
            async move { Ok(format!("{} args", args.len())) }.boxed()
        });
        let out = tokio_test::block_on(handler.call(ArgumentSet::default(), ToolContext::new()));
        assert_eq!(out.unwrap(), "0 args");
    }
}
