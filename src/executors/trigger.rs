/// Entry-point executors: start, manualTrigger, scheduleTrigger
///
/// Triggers take no inputs and emit `{triggered, timestamp}` so downstream
/// nodes have a deterministic payload shape to key on.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::error::Result;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct TriggerExecutor;

#[async_trait]
impl NodeRunner for TriggerExecutor {
    async fn execute(&self, _ctx: ExecutionContext) -> Result<ExecutorOutput> {
        Ok(ExecutorOutput::value(json!({
            "triggered": true,
            "timestamp": Utc::now().to_rfc3339(),
        })))
    }
}
