/// Executor registry
///
/// Maps each node type to its executor. Executors are a closed variant set
/// dispatched through the registry; every one implements the cheap
/// `validate` check and the suspendable `execute` body.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::workflow::types::NodeType;

/// Per-type node behavior.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    /// Cheap pre-run checks (required config present, well-formed values).
    /// A failure marks the node as error without executing it.
    fn validate(&self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Execute the node. May suspend at I/O, delays, and LLM calls, and
    /// must observe `ctx.cancel` at every suspension point.
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput>;
}

/// Registry of executors keyed by node type.
pub struct ExecutorRegistry {
    runners: HashMap<NodeType, Arc<dyn NodeRunner>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
        }
    }

    /// Register (or replace) the executor for a node type.
    pub fn register(&mut self, node_type: NodeType, runner: Arc<dyn NodeRunner>) {
        self.runners.insert(node_type, runner);
    }

    /// Look up the executor for a node type.
    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeRunner>> {
        self.runners.get(&node_type).cloned()
    }

    /// Registry with all built-in executors registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::executors::register_builtins(&mut registry);
        registry
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
