/// Python executor
///
/// Delegates to the pluggable PythonRuntime service with `inputs`
/// injected. Structured results (objects/arrays) are persisted as JSON
/// artifacts and passed by reference; scalars flow through directly.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct PythonExecutor;

#[async_trait]
impl NodeRunner for PythonExecutor {
    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.data_str("code").map_or(true, str::is_empty) {
            return Err(EngineError::InvalidInput(
                "python node requires a code script".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let runtime = ctx
            .services
            .python
            .as_ref()
            .ok_or_else(|| {
                EngineError::ServiceUnavailable("no python runtime configured".to_string())
            })?
            .clone();

        let code = ctx.data_str("code").unwrap_or_default();

        // Agent tool calls wrap their payload as {inputs: ...}; unwrap it so
        // the script sees the same shape as a dataflow invocation.
        let inputs = match ctx.inputs.get("inputs") {
            Some(inner) if ctx.inputs.as_object().map(|o| o.len()) == Some(1) => inner.clone(),
            _ => ctx.inputs.clone(),
        };

        let result = tokio::select! {
            result = runtime.run(code, inputs) => result?,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        match &result {
            Value::Object(_) | Value::Array(_) => {
                let bytes = serde_json::to_vec(&result)
                    .map_err(|e| EngineError::ExternalError(format!("result serialize: {e}")))?;
                let artifact_id = ctx
                    .services
                    .artifacts
                    .save(bytes, "data", Some("application/json"))
                    .await?;
                Ok(ExecutorOutput::value(json!({
                    "artifactId": artifact_id,
                    "type": "json",
                })))
            }
            _ => Ok(ExecutorOutput::value(result)),
        }
    }
}
