//! Tool Registry - central registration and dispatch for all tools.
//!
//! This module provides:
//! - [`ToolDefinition`]: a named tool with its parameter schema and handler
//! - [`ToolRegistry`]: the name → definition map, validation and dispatch
//!
//! Definitions are registered once at startup and never mutated afterwards.
//! [`ToolRegistry::invoke`] is the single seam the transports depend on: it
//! always returns a [`ToolResult`], whatever the handler does.

use futures::FutureExt;
use rmcp::model::Tool;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::error::{RegistrationError, ToolError};
use super::handlers::{ToolContext, ToolHandler, ToolResult};
use super::schema::{ParameterSpec, input_schema, validate_arguments};

// ============================================================================
// Tool Definition
// ============================================================================

/// A named, schema-described tool bound to its handler.
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    /// Create a definition with no parameters.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Append a parameter declaration.
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Replace the parameter list.
    pub fn params(mut self, specs: impl IntoIterator<Item = ParameterSpec>) -> Self {
        self.parameters = specs.into_iter().collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Introspection view of this definition.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Create a Tool model for this tool (MCP metadata).
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone().into(),
            description: Some(self.description.clone().into()),
            input_schema: Arc::new(input_schema(&self.parameters)),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    fn check(&self) -> Result<(), RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::invalid(&self.name, "tool name is empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for spec in &self.parameters {
            spec.check(&self.name)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(RegistrationError::invalid(
                    &self.name,
                    format!("parameter '{}' declared twice", spec.name),
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Read-only description of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - owns every tool definition and dispatches calls to them.
///
/// Populate it during startup with [`register`](Self::register), then share
/// it (typically behind an `Arc`) with the transport. Concurrent
/// [`invoke`](Self::invoke) calls are independent of each other.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// Fails if the definition is malformed or the name is taken; the
    /// existing definition is left in place.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistrationError> {
        definition.check()?;

        if self.tools.contains_key(&definition.name) {
            return Err(RegistrationError::DuplicateName(definition.name));
        }

        info!("Registering tool: {}", definition.name);
        self.tools.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Get all tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// List every definition, ordered by name.
    pub fn list_definitions(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(ToolDefinition::descriptor).collect()
    }

    /// Get all tools as MCP Tool models, ordered by name.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.values().map(ToolDefinition::to_tool).collect()
    }

    /// Validate and dispatch a call.
    ///
    /// Unknown tools, invalid arguments, handler errors, handler panics and
    /// cancellation all come back as [`ToolResult::Failure`].
    #[instrument(skip(self, arguments, ctx))]
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<&Map<String, Value>>,
        ctx: ToolContext,
    ) -> ToolResult {
        let Some(definition) = self.tools.get(name) else {
            warn!("Unknown tool requested: {}", name);
            return ToolResult::failure(ToolError::not_found(name).to_string());
        };

        let args = match validate_arguments(&definition.parameters, arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("Rejected call to '{}': {}", name, e);
                return ToolResult::failure(ToolError::from(e).to_string());
            }
        };

        if ctx.is_cancelled() {
            return ToolResult::failure(ToolError::Cancelled.to_string());
        }

        debug!("Dispatching '{}' with {} argument(s)", name, args.len());

        let call = AssertUnwindSafe(definition.handler.call(args, ctx.clone())).catch_unwind();
        let outcome = match ctx.run(call).await {
            Ok(outcome) => outcome,
            Err(cancelled) => {
                warn!("Tool '{}' cancelled", name);
                return ToolResult::failure(cancelled.to_string());
            }
        };

        match outcome {
            Ok(Ok(text)) => ToolResult::success(text),
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", name, e);
                ToolResult::failure(e.to_string())
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!(panic = %msg, "Tool '{}' panicked", name);
                ToolResult::failure(ToolError::Panicked(msg).to_string())
            }
        }
    }

    /// Dispatch a call whose arguments arrive as an arbitrary JSON value.
    pub async fn invoke_json(&self, name: &str, arguments: &Value, ctx: ToolContext) -> ToolResult {
        match arguments {
            Value::Object(map) => self.invoke(name, Some(map), ctx).await,
            Value::Null => self.invoke(name, None, ctx).await,
            _ => ToolResult::failure(
                ToolError::from(super::error::ValidationError::NotAnObject).to_string(),
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::handlers::{FnHandler, HandlerResult};
    use crate::domains::tools::schema::ArgumentSet;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SyncFn<F>(F);

    #[async_trait::async_trait]
    impl<F> ToolHandler for SyncFn<F>
    where
        F: Fn(ArgumentSet) -> HandlerResult + Send + Sync,
    {
        async fn call(&self, args: ArgumentSet, _ctx: ToolContext) -> HandlerResult {
            (self.0)(args)
        }
    }

    fn handler<F>(f: F) -> SyncFn<F>
    where
        F: Fn(ArgumentSet) -> HandlerResult + Send + Sync,
    {
        SyncFn(f)
    }

    fn echo_tool(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "Echo the message back",
            handler(|args| Ok(args.require_str("message")?.to_string())),
        )
        .param(ParameterSpec::string("message").required())
        .param(
            ParameterSpec::string("mode")
                .one_of(["plain", "loud"])
                .with_default("plain"),
        )
    }

    fn panicking_tool() -> ToolDefinition {
        ToolDefinition::new(
            "explode",
            "Always panics",
            handler(|_args| panic!("handler blew up")),
        )
    }

    fn failing_tool() -> ToolDefinition {
        ToolDefinition::new(
            "read_missing",
            "Fails with an I/O error",
            handler(|_args| {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into())
            }),
        )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_register_and_names() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        registry.register(panicking_tool()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), vec!["echo", "explode"]);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let other = ToolDefinition::new("echo", "Imposter", handler(|_| Ok("x".into())));
        let err = registry.register(other).unwrap_err();

        assert_eq!(err, RegistrationError::DuplicateName("echo".into()));
        assert_eq!(registry.get("echo").unwrap().description(), "Echo the message back");
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let mut registry = ToolRegistry::new();

        let unnamed = ToolDefinition::new("", "No name", handler(|_| Ok(String::new())));
        assert!(matches!(
            registry.register(unnamed),
            Err(RegistrationError::InvalidDefinition { .. })
        ));

        let twice = ToolDefinition::new("twice", "Dup params", handler(|_| Ok(String::new())))
            .param(ParameterSpec::string("a"))
            .param(ParameterSpec::number("a"));
        assert!(matches!(
            registry.register(twice),
            Err(RegistrationError::InvalidDefinition { .. })
        ));

        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_definitions_idempotent() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("b_echo")).unwrap();
        registry.register(echo_tool("a_echo")).unwrap();

        let first = registry.list_definitions();
        let second = registry.list_definitions();
        assert_eq!(first, second);
        assert_eq!(first[0].name, "a_echo");
        assert_eq!(first[0].parameters.len(), 2);
    }

    #[test]
    fn test_list_tools_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let tools = registry.list_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].input_schema["required"], json!(["message"]));
    }

    #[tokio::test]
    async fn test_invoke_success_with_default() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let result = registry
            .invoke("echo", Some(&args(json!({ "message": "hi" }))), ToolContext::new())
            .await;
        assert_eq!(result, ToolResult::success("hi"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = ToolRegistry::new();
        let result = registry
            .invoke("nonexistent_tool", None, ToolContext::new())
            .await;

        assert!(result.is_failure());
        assert!(result.text().contains("nonexistent_tool"));
        assert!(result.text().contains("not registered"));
    }

    #[tokio::test]
    async fn test_invoke_missing_parameter_is_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let result = registry.invoke("echo", None, ToolContext::new()).await;
        assert!(result.is_failure());
        assert!(result.text().contains("message"));
    }

    #[tokio::test]
    async fn test_invoke_enum_violation_is_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let result = registry
            .invoke(
                "echo",
                Some(&args(json!({ "message": "hi", "mode": "whisper" }))),
                ToolContext::new(),
            )
            .await;
        assert!(result.is_failure());
        assert!(result.text().contains("whisper"));
    }

    #[tokio::test]
    async fn test_handler_not_called_on_validation_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDefinition::new(
                    "count",
                    "Counts invocations",
                    handler(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok("counted".into())
                    }),
                )
                .param(ParameterSpec::number("n").required()),
            )
            .unwrap();

        let bad = registry
            .invoke("count", Some(&args(json!({ "n": "one" }))), ToolContext::new())
            .await;
        assert!(bad.is_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let good = registry
            .invoke("count", Some(&args(json!({ "n": 1 }))), ToolContext::new())
            .await;
        assert!(good.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fault_isolation() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        registry.register(panicking_tool()).unwrap();
        registry.register(failing_tool()).unwrap();

        let panicked = registry.invoke("explode", None, ToolContext::new()).await;
        assert!(panicked.is_failure());
        assert!(panicked.text().contains("handler blew up"));

        let failed = registry.invoke("read_missing", None, ToolContext::new()).await;
        assert!(failed.is_failure());
        assert!(failed.text().contains("no such file"));

        let ok = registry
            .invoke("echo", Some(&args(json!({ "message": "still up" }))), ToolContext::new())
            .await;
        assert_eq!(ok, ToolResult::success("still up"));
    }

    #[tokio::test]
    async fn test_cancellation_is_failure() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::new(
                "slow",
                "Sleeps for a long time",
                FnHandler::new(|_args: ArgumentSet, _ctx: ToolContext| {
                    async move {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok("woke".to_string())
                    }
                    .boxed()
                }),
            ))
            .unwrap();

        let ctx = ToolContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = registry.invoke("slow", None, ctx).await;
        assert_eq!(result, ToolResult::failure("Tool execution cancelled"));
    }

    #[tokio::test]
    async fn test_concurrent_invocations() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        registry.register(panicking_tool()).unwrap();
        let registry = Arc::new(registry);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    registry.invoke("explode", None, ToolContext::new()).await
                } else {
                    let a = args(json!({ "message": format!("m{}", i) }));
                    registry.invoke("echo", Some(&a), ToolContext::new()).await
                }
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            let result = task.await.unwrap();
            if i % 4 == 0 {
                assert!(result.is_failure());
            } else {
                assert_eq!(result, ToolResult::success(format!("m{}", i)));
            }
        }
    }

    #[tokio::test]
    async fn test_invoke_json_rejects_non_object() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let result = registry
            .invoke_json("echo", &json!("message"), ToolContext::new())
            .await;
        assert!(result.is_failure());
    }
}
