/// AI agent executor
///
/// Discovers its tools from resource edges pointing at the node, then
/// drives the ReAct loop against the injected LLM. Tool dispatch re-enters
/// the engine through `execute_node`, inheriting the run's services and
/// cancellation; the main run's status map stays untouched.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::engine::ExecutionEngine;
use crate::runtime::registry::NodeRunner;
use crate::runtime::state::LogLevel;
use crate::services::tool_calling::{
    schema_for_node, ToolBinding, ToolCallingService, ToolDispatcher, DEFAULT_MAX_ITERATIONS,
};
use crate::workflow::types::Workflow;

pub struct AgentExecutor;

#[async_trait]
impl NodeRunner for AgentExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let llm = ctx
            .services
            .llm
            .as_ref()
            .ok_or_else(|| EngineError::ServiceUnavailable("no LLM backend configured".to_string()))?
            .clone();
        let engine = ctx
            .engine
            .as_ref()
            .ok_or_else(|| {
                EngineError::ServiceUnavailable("agent requires an engine context".to_string())
            })?
            .clone();

        let prompt = user_prompt_from(&ctx.inputs, &ctx.node_data);
        let tools = discover_tools(&ctx.workflow, &ctx.node_id);
        ctx.log(
            LogLevel::Info,
            format!("agent starting with {} tool(s)", tools.len()),
        );

        let max_iterations = ctx
            .data_u64("maxIterations")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_ITERATIONS);
        let service = ToolCallingService::new(tools, max_iterations);

        let dispatcher = EngineDispatcher {
            engine,
            workflow: Arc::clone(&ctx.workflow),
            cancel: ctx.cancel.clone(),
        };

        let outcome = service.run(llm.as_ref(), &dispatcher, &prompt).await?;
        if outcome.limit_hit {
            ctx.log(
                LogLevel::Error,
                format!("[MaxIterations] agent stopped after {max_iterations} iterations"),
            );
        }

        Ok(ExecutorOutput::value(json!({
            "response": outcome.response,
            "trace": outcome.steps,
        })))
    }
}

/// Tool dispatch through engine re-entry.
struct EngineDispatcher {
    engine: Arc<ExecutionEngine>,
    workflow: Arc<Workflow>,
    cancel: CancellationToken,
}

#[async_trait]
impl ToolDispatcher for EngineDispatcher {
    async fn dispatch(&self, node_id: &str, input: Value) -> Result<Value> {
        self.engine
            .execute_node(&self.workflow, node_id, input, self.cancel.clone())
            .await
    }

    async fn dispatch_builtin(&self, type_tag: &str, input: Value) -> Result<Value> {
        self.engine
            .execute_builtin(&self.workflow, type_tag, input, self.cancel.clone())
            .await
    }
}

/// String passthrough, `inputs.prompt`, node config, or the JSON dump.
fn user_prompt_from(inputs: &Value, node_data: &Value) -> String {
    if let Some(text) = inputs.as_str() {
        return text.to_string();
    }
    if let Some(text) = inputs.get("prompt").and_then(|p| p.as_str()) {
        return text.to_string();
    }
    if let Some(text) = node_data.get("prompt").and_then(|p| p.as_str()) {
        return text.to_string();
    }
    serde_json::to_string(inputs).unwrap_or_default()
}

/// Source nodes of resource edges targeting the agent are its tools.
fn discover_tools(workflow: &Workflow, agent_id: &str) -> Vec<ToolBinding> {
    workflow
        .edges
        .iter()
        .filter(|edge| edge.target == agent_id && edge.is_resource())
        .filter_map(|edge| workflow.node(&edge.source))
        .map(|node| {
            let description = node.data.get("description").and_then(|d| d.as_str());
            ToolBinding {
                schema: schema_for_node(node.node_type.tag(), &node.id, description),
                node_id: node.id.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tools_come_from_resource_edges_only() {
        let workflow: Workflow = serde_json::from_value(json!({
            "nodes": [
                {"id": "agent-1", "type": "aiAgent"},
                {"id": "py-1", "type": "python", "data": {"code": "x"}},
                {"id": "up", "type": "manualTrigger"}
            ],
            "edges": [
                {"id": "e1", "source": "py-1", "target": "agent-1", "targetHandle": "resource-tools"},
                {"id": "e2", "source": "up", "target": "agent-1"}
            ]
        }))
        .unwrap();

        let tools = discover_tools(&workflow, "agent-1");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].node_id, "py-1");
        assert_eq!(tools[0].schema.name, "python_py_1");
    }

    #[test]
    fn prompt_resolution_order() {
        assert_eq!(user_prompt_from(&json!("hi"), &json!({})), "hi");
        assert_eq!(
            user_prompt_from(&json!({"prompt": "from inputs"}), &json!({"prompt": "from data"})),
            "from inputs"
        );
        assert_eq!(
            user_prompt_from(&json!({"other": 1}), &json!({"prompt": "from data"})),
            "from data"
        );
        assert_eq!(user_prompt_from(&json!({"a": 1}), &json!({})), "{\"a\":1}");
    }
}
