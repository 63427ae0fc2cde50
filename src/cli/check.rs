//! Compile and evaluate an expression against JSON input

use tracing::debug;

use super::CliError;
use crate::{Sift, Value};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to evaluate
    pub expression: String,
    /// JSON context; evaluation runs against `undefined` without one
    pub input: Option<String>,
    /// Only validate syntax, don't evaluate
    pub syntax_only: bool,
    /// Register the standard transforms
    pub stdlib: bool,
}

/// Result of a check operation
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Expression evaluated successfully
    Success(serde_json::Value),
}

/// Execute a sift check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let sift = if options.stdlib {
        Sift::with_stdlib()
    } else {
        Sift::new()
    };

    let expression = sift.compile(&options.expression).map_err(CliError::Expression)?;
    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let context = match &options.input {
        Some(json) => Value::from(serde_json::from_str::<serde_json::Value>(json)?),
        None => Value::Undefined,
    };
    debug!(context = context.type_name(), "evaluating expression");

    let result = expression.eval_sync(context)?;
    Ok(CheckResult::Success(result.to_json()))
}
