/// Switch executor
///
/// Resolves `inputs[switchKey]` to a string and picks the matching entry
/// in `cases`. The chosen branch is announced through activeHandles as
/// `<nodeId>-case-<match>`; the engine routes the rest of the fan-out dead.
/// With no match and no "default" case, every outgoing edge dies.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;
use crate::runtime::state::LogLevel;

pub struct SwitchExecutor;

#[async_trait]
impl NodeRunner for SwitchExecutor {
    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.data_str("switchKey").map_or(true, str::is_empty) {
            return Err(EngineError::InvalidInput(
                "switch node requires a switchKey".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let key = ctx.data_str("switchKey").unwrap_or_default();
        let resolved = coerce_to_string(ctx.inputs.get(key).unwrap_or(&Value::Null));

        let cases: Vec<String> = ctx
            .node_data
            .get("cases")
            .and_then(|c| c.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => coerce_to_string(other),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let matched = if cases.iter().any(|case| case == &resolved) {
            Some(resolved.clone())
        } else if cases.iter().any(|case| case == "default") {
            Some("default".to_string())
        } else {
            None
        };

        match matched {
            Some(case) => {
                ctx.log(
                    LogLevel::Info,
                    format!("switch matched case '{case}' for key '{key}'"),
                );
                let handle = format!("{}-case-{}", ctx.node_id, case);
                Ok(ExecutorOutput::routed(ctx.inputs.clone(), vec![handle]))
            }
            None => {
                ctx.log(
                    LogLevel::Info,
                    format!("switch matched no case for key '{key}' (value '{resolved}')"),
                );
                Ok(ExecutorOutput::routed(ctx.inputs.clone(), Vec::new()))
            }
        }
    }
}

/// String coercion used for case matching.
pub(crate) fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
