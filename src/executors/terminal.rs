/// Terminal executors: end, output
///
/// Pass inputs through unchanged; the engine fires none of their outgoing
/// edges, so the run quiesces behind them.

use async_trait::async_trait;

use crate::error::Result;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct OutputExecutor;

#[async_trait]
impl NodeRunner for OutputExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        Ok(ExecutorOutput::value(ctx.inputs))
    }
}
