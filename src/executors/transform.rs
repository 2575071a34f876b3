/// Transform executor
///
/// Small data reshaping steps: json-parse, json-stringify, extract, and
/// `{{name}}` template substitution. Unknown transform types pass inputs
/// through untouched.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::executors::branch::coerce_to_string;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct TransformExecutor;

#[async_trait]
impl NodeRunner for TransformExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let transform_type = ctx.data_str("transformType").unwrap_or_default();
        let output = match transform_type {
            "json-parse" => {
                let text = ctx.inputs.as_str().ok_or_else(|| {
                    EngineError::InvalidInput("json-parse expects a string input".to_string())
                })?;
                serde_json::from_str(text)
                    .map_err(|e| EngineError::InvalidInput(format!("json-parse failed: {e}")))?
            }
            "json-stringify" => {
                let text = serde_json::to_string(&ctx.inputs)
                    .map_err(|e| EngineError::InvalidInput(format!("json-stringify failed: {e}")))?;
                Value::String(text)
            }
            "extract" => {
                let key = ctx.data_str("key").unwrap_or_default();
                ctx.inputs.get(key).cloned().unwrap_or(Value::Null)
            }
            "template" => {
                let template = ctx.data_str("template").unwrap_or_default();
                Value::String(render_template(template, &ctx.inputs))
            }
            _ => ctx.inputs.clone(),
        };
        Ok(ExecutorOutput::value(output))
    }
}

/// Replace every `{{name}}` with the string coercion of `inputs[name]`.
/// Placeholders with no matching key are left alone.
pub(crate) fn render_template(template: &str, inputs: &Value) -> String {
    let mut rendered = template.to_string();
    if let Value::Object(map) = inputs {
        for (key, value) in map {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), &coerce_to_string(value));
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_substitutes_known_keys_only() {
        let inputs = json!({"name": "ada", "count": 3});
        assert_eq!(
            render_template("{{name}} x{{count}} {{missing}}", &inputs),
            "ada x3 {{missing}}"
        );
    }
}
