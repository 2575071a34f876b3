/// Code executor: sandboxed Lua evaluation
///
/// Runs the node's script with `inputs` bound as a global. The sandbox
/// removes os/io/package/debug and the module loaders, so scripts cannot
/// touch the filesystem, the network, or spawn processes. The script's
/// return value is the node output unless it sets a global `output`.
/// Evaluation is synchronous Lua, so it runs on the blocking pool.

use async_trait::async_trait;
use mlua::{Lua, LuaSerdeExt};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct CodeExecutor;

#[async_trait]
impl NodeRunner for CodeExecutor {
    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.data_str("code").map_or(true, str::is_empty) {
            return Err(EngineError::InvalidInput(
                "codeExecutor node requires a code script".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let code = ctx.data_str("code").unwrap_or_default().to_string();
        let inputs = ctx.inputs.clone();

        let evaluated = tokio::task::spawn_blocking(move || eval_sandboxed(&code, inputs))
            .await
            .map_err(|e| EngineError::ExternalError(format!("script task failed: {e}")))??;

        Ok(ExecutorOutput::value(evaluated))
    }
}

/// Evaluate a script in a fresh sandboxed Lua state.
fn eval_sandboxed(code: &str, inputs: Value) -> Result<Value> {
    let lua = Lua::new();
    let globals = lua.globals();

    // Strip everything that reaches outside the interpreter.
    for name in [
        "os", "io", "package", "debug", "require", "dofile", "loadfile", "load", "loadstring",
        "collectgarbage",
    ] {
        globals
            .set(name, mlua::Nil)
            .map_err(|e| EngineError::ExternalError(format!("sandbox setup failed: {e}")))?;
    }

    let lua_inputs = lua
        .to_value(&inputs)
        .map_err(|e| EngineError::InvalidInput(format!("inputs not representable: {e}")))?;
    globals
        .set("inputs", lua_inputs)
        .map_err(|e| EngineError::ExternalError(format!("sandbox setup failed: {e}")))?;

    let evaluated: mlua::Value = lua
        .load(code)
        .eval()
        .map_err(|e| EngineError::ExternalError(format!("script failed: {e}")))?;

    // An explicit `output` global wins over the evaluated value.
    let explicit: mlua::Value = globals
        .get("output")
        .map_err(|e| EngineError::ExternalError(format!("script failed: {e}")))?;
    let chosen = if explicit.is_nil() { evaluated } else { explicit };

    lua.from_value(chosen)
        .map_err(|e| EngineError::ExternalError(format!("script result not representable: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn returns_evaluated_value() {
        let result = eval_sandboxed("return inputs.x * 2", json!({"x": 21})).unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn explicit_output_global_wins() {
        let result = eval_sandboxed("output = 'done'; return 1", json!(null)).unwrap();
        assert_eq!(result, json!("done"));
    }

    #[test]
    fn sandbox_blocks_filesystem_access() {
        assert!(eval_sandboxed("return io.open('/etc/passwd')", json!(null)).is_err());
        assert!(eval_sandboxed("return os.execute('true')", json!(null)).is_err());
        assert!(eval_sandboxed("return require('socket')", json!(null)).is_err());
    }

    #[test]
    fn script_errors_surface_as_node_errors() {
        assert!(eval_sandboxed("error('boom')", json!(null)).is_err());
    }
}
