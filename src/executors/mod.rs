/// Node executors
///
/// One executor per node type, registered into the ExecutorRegistry. Each
/// implements the `validate`/`execute` contract from the runtime registry.

mod agent;
mod branch;
mod code;
mod condition;
mod delay;
mod http;
mod image;
mod llm;
mod merge;
mod python;
mod speech;
mod terminal;
mod transform;
mod trigger;

use std::sync::Arc;

use crate::runtime::registry::ExecutorRegistry;
use crate::workflow::types::NodeType;

pub use agent::AgentExecutor;
pub use branch::SwitchExecutor;
pub use code::CodeExecutor;
pub use condition::IfElseExecutor;
pub use delay::DelayExecutor;
pub use http::HttpRequestExecutor;
pub use image::ImageGenerationExecutor;
pub use llm::LlmExecutor;
pub use merge::MergeExecutor;
pub use python::PythonExecutor;
pub use speech::TextToSpeechExecutor;
pub use terminal::OutputExecutor;
pub use transform::TransformExecutor;
pub use trigger::TriggerExecutor;

/// Register every built-in executor.
pub fn register_builtins(registry: &mut ExecutorRegistry) {
    let trigger = Arc::new(TriggerExecutor);
    registry.register(NodeType::Start, trigger.clone());
    registry.register(NodeType::ManualTrigger, trigger.clone());
    registry.register(NodeType::ScheduleTrigger, trigger);

    let output = Arc::new(OutputExecutor);
    registry.register(NodeType::End, output.clone());
    registry.register(NodeType::Output, output);

    registry.register(NodeType::Merge, Arc::new(MergeExecutor));
    registry.register(NodeType::Switch, Arc::new(SwitchExecutor));
    registry.register(NodeType::IfElse, Arc::new(IfElseExecutor));
    registry.register(NodeType::Delay, Arc::new(DelayExecutor));
    registry.register(NodeType::Transform, Arc::new(TransformExecutor));
    registry.register(NodeType::CodeExecutor, Arc::new(CodeExecutor));
    registry.register(NodeType::HttpRequest, Arc::new(HttpRequestExecutor::new()));
    registry.register(NodeType::Python, Arc::new(PythonExecutor));
    registry.register(NodeType::TextToSpeech, Arc::new(TextToSpeechExecutor));
    registry.register(NodeType::ImageGeneration, Arc::new(ImageGenerationExecutor));
    registry.register(NodeType::Llm, Arc::new(LlmExecutor));
    registry.register(NodeType::AiAgent, Arc::new(AgentExecutor));
}
