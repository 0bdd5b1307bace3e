//! Calculator tool definition.
//!
//! Basic arithmetic on two numbers.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::domains::tools::{
    ArgumentSet, HandlerResult, ParameterSpec, ToolContext, ToolDefinition, ToolError,
    ToolHandler,
};

/// Calculator tool - performs arithmetic on two operands.
pub struct CalculatorTool;

impl CalculatorTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "calculator";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str =
        "Perform basic arithmetic (add, subtract, multiply, divide, power, modulo) on two numbers.";

    const OPERATIONS: [&'static str; 6] =
        ["add", "subtract", "multiply", "divide", "power", "modulo"];

    /// Build the registry entry for this tool.
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(Self::NAME, Self::DESCRIPTION, Self)
            .param(
                ParameterSpec::string("operation")
                    .required()
                    .describe("The operation to perform")
                    .one_of(Self::OPERATIONS),
            )
            .param(ParameterSpec::number("x").required().describe("First operand"))
            .param(ParameterSpec::number("y").required().describe("Second operand"))
    }

    /// Apply `operation` to the operands.
    pub fn compute(operation: &str, x: f64, y: f64) -> Result<f64, ToolError> {
        let result = match operation {
            "add" => x + y,
            "subtract" => x - y,
            "multiply" => x * y,
            "divide" | "modulo" if y == 0.0 => {
                return Err(ToolError::execution_failed("division by zero"));
            }
            "divide" => x / y,
            "modulo" => x % y,
            "power" => x.powf(y),
            other => {
                return Err(ToolError::invalid_arguments(format!(
                    "unsupported operation '{}'",
                    other
                )));
            }
        };

        if !result.is_finite() {
            return Err(ToolError::execution_failed(format!(
                "result of {} is not a finite number",
                operation
            )));
        }
        Ok(result)
    }

    fn symbol(operation: &str) -> &'static str {
        match operation {
            "add" => "+",
            "subtract" => "-",
            "multiply" => "*",
            "divide" => "/",
            "power" => "^",
            "modulo" => "%",
            _ => "?",
        }
    }
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    #[instrument(name = "calculator", skip_all)]
    async fn call(&self, args: ArgumentSet, _ctx: ToolContext) -> HandlerResult {
        let operation = args.require_str("operation")?;
        let x = args.require_number("x")?;
        let y = args.require_number("y")?;

        info!("Calculator: {} {} {}", x, operation, y);
        let result = Self::compute(operation, x, y)?;

        Ok(format!(
            "{} {} {} = {}",
            format_number(x),
            Self::symbol(operation),
            format_number(y),
            format_number(result)
        ))
    }
}

/// Render a number without binary floating-point noise.
///
/// Values are rounded to 10 decimal places and trailing zeros trimmed, so
/// `15.5 + 24.3` prints as `39.8` and whole numbers print without a fraction.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{:.10}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
