/// Merge executor
///
/// The engine only schedules a merge once its readiness condition holds,
/// so the branches the strategy needs have already succeeded. Branches are read straight from execution state,
/// keyed by source node id, in edge order. Strategies:
/// - object: `{sourceId -> value}` mapping
/// - array:  the branch values
/// - concat: the branch values with arrays flattened one level
/// - first:  the first completed branch

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct MergeExecutor;

#[async_trait]
impl NodeRunner for MergeExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let branches = completed_branches(&ctx);
        let strategy = ctx.data_str("mergeStrategy").unwrap_or("object");

        let merged = match strategy {
            "array" => Value::Array(branches.into_iter().map(|(_, value)| value).collect()),
            "concat" => {
                let mut flat = Vec::new();
                for (_, value) in branches {
                    match value {
                        Value::Array(items) => flat.extend(items),
                        other => flat.push(other),
                    }
                }
                Value::Array(flat)
            }
            "first" => branches
                .into_iter()
                .next()
                .map(|(_, value)| value)
                .unwrap_or(Value::Null),
            // object (default): wrap by source id
            _ => Value::Object(branches.into_iter().collect()),
        };

        Ok(ExecutorOutput::value(merged))
    }
}

/// Successful upstream outputs in incoming-edge order, one per source.
fn completed_branches(ctx: &ExecutionContext) -> Vec<(String, Value)> {
    let mut branches = Vec::new();
    for edge in &ctx.workflow.edges {
        if edge.target != ctx.node_id || edge.is_resource() {
            continue;
        }
        if branches.iter().any(|(source, _)| source == &edge.source) {
            continue;
        }
        if let Some(output) = ctx.state.node_output(&edge.source) {
            branches.push((edge.source.clone(), output));
        }
    }
    branches
}
