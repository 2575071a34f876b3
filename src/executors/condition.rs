/// IfElse executor
///
/// Compares `inputs[field]` against the configured value with one of
/// equals/notEquals/contains/greaterThan/lessThan/regex. Numeric operators
/// coerce both sides to numbers, contains and regex work on string
/// coercion. An evaluation error does not fail the node: it logs a warning
/// and routes the false branch.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::executors::branch::coerce_to_string;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;
use crate::runtime::state::LogLevel;

pub struct IfElseExecutor;

#[async_trait]
impl NodeRunner for IfElseExecutor {
    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.data_str("field").map_or(true, str::is_empty) {
            return Err(EngineError::InvalidInput(
                "ifElse node requires a field to compare".to_string(),
            ));
        }
        let operator = ctx.data_str("operator").unwrap_or("equals");
        if !matches!(
            operator,
            "equals" | "notEquals" | "contains" | "greaterThan" | "lessThan" | "regex"
        ) {
            return Err(EngineError::InvalidInput(format!(
                "unknown ifElse operator: {operator}"
            )));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let field = ctx.data_str("field").unwrap_or_default();
        let operator = ctx.data_str("operator").unwrap_or("equals");
        let expected = ctx.node_data.get("value").cloned().unwrap_or(Value::Null);
        let actual = ctx.inputs.get(field).cloned().unwrap_or(Value::Null);

        let result = match evaluate(operator, &actual, &expected) {
            Ok(result) => result,
            Err(reason) => {
                ctx.log(
                    LogLevel::Info,
                    format!("condition evaluation failed, treating as false: {reason}"),
                );
                tracing::warn!(
                    "⚠️ ifElse {} evaluation failed: {}",
                    ctx.node_id,
                    reason
                );
                false
            }
        };

        let handle = format!("{}-{}", ctx.node_id, result);
        ctx.log(LogLevel::Info, format!("condition evaluated to {result}"));
        Ok(ExecutorOutput::routed(ctx.inputs.clone(), vec![handle]))
    }
}

fn evaluate(operator: &str, actual: &Value, expected: &Value) -> std::result::Result<bool, String> {
    match operator {
        "equals" => Ok(loose_equals(actual, expected)),
        "notEquals" => Ok(!loose_equals(actual, expected)),
        "contains" => Ok(coerce_to_string(actual).contains(&coerce_to_string(expected))),
        "greaterThan" => {
            let (a, b) = numeric_pair(actual, expected)?;
            Ok(a > b)
        }
        "lessThan" => {
            let (a, b) = numeric_pair(actual, expected)?;
            Ok(a < b)
        }
        "regex" => {
            let pattern =
                Regex::new(&coerce_to_string(expected)).map_err(|e| format!("bad pattern: {e}"))?;
            Ok(pattern.is_match(&coerce_to_string(actual)))
        }
        other => Err(format!("unknown operator: {other}")),
    }
}

/// Equality with numeric coercion when both sides look numeric.
fn loose_equals(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    coerce_to_string(a) == coerce_to_string(b)
}

fn numeric_pair(a: &Value, b: &Value) -> std::result::Result<(f64, f64), String> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(format!(
            "non-numeric comparison operands: {a} vs {b}"
        )),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_comparison_coerces_strings() {
        assert!(evaluate("greaterThan", &json!("42"), &json!(10)).unwrap());
        assert!(!evaluate("lessThan", &json!(42), &json!("10")).unwrap());
    }

    #[test]
    fn equals_is_loose_across_types() {
        assert!(loose_equals(&json!(5), &json!("5")));
        assert!(loose_equals(&json!("abc"), &json!("abc")));
        assert!(!loose_equals(&json!("abc"), &json!("abd")));
    }

    #[test]
    fn bad_regex_reports_instead_of_panicking() {
        assert!(evaluate("regex", &json!("x"), &json!("(")).is_err());
    }
}
