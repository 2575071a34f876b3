/// Delay executor
///
/// Waits `delay` milliseconds (default 1000) and passes inputs through.
/// Cancellation interrupts the wait immediately.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

const DEFAULT_DELAY_MS: u64 = 1000;

pub struct DelayExecutor;

#[async_trait]
impl NodeRunner for DelayExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let millis = ctx.data_u64("delay").unwrap_or(DEFAULT_DELAY_MS);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {
                Ok(ExecutorOutput::value(ctx.inputs))
            }
            _ = ctx.cancel.cancelled() => Err(EngineError::Cancelled),
        }
    }
}
