/// Runtime Execution Engine
///
/// This module provides the level-parallel graph execution engine:
/// - Per-run execution state with observers
/// - Executor registry and execution contexts
/// - The traversal engine with routing, merges, and cancellation
/// - The minute-granular schedule-trigger service

// Per-run state: statuses, outputs, edge snapshots, log
pub mod state;

// Execution context and executor output types
pub mod context;

// Executor trait and type registry
pub mod registry;

// The traversal engine
pub mod engine;

// Background schedule-trigger service
pub mod scheduler;

// Re-export main types
pub use context::{ExecutionContext, ExecutorOutput};
pub use engine::ExecutionEngine;
pub use registry::{ExecutorRegistry, NodeRunner};
pub use scheduler::Scheduler;
pub use state::{ExecutionState, LogLevel, NodeStatus};
