/// Service interfaces injected into executors
///
/// Concrete LLM, python, speech, and image backends live behind these
/// traits. Nodes that need a backend that is not wired fail with
/// ServiceUnavailable instead of reaching for a default.

pub mod llm;
pub mod tool_calling;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::artifact::ArtifactStore;
use crate::error::Result;

pub use llm::{ChatMessage, ChatRequest, ChatResponse, HttpLlmService, LlmService, TokenUsage};
pub use tool_calling::{AgentOutcome, AgentStep, AgentStepKind, ToolCallingService, ToolDispatcher, ToolSchema};

/// Pluggable python interpreter used by python nodes and agent tools.
#[async_trait]
pub trait PythonRuntime: Send + Sync {
    /// Run a script with `inputs` injected; returns the script result.
    async fn run(&self, code: &str, inputs: Value) -> Result<Value>;
}

/// Synthesis options for textToSpeech nodes.
#[derive(Debug, Clone, Default)]
pub struct SpeechOptions {
    pub voice: Option<String>,
    pub rate: Option<f64>,
    pub pitch: Option<f64>,
}

/// Pluggable text-to-speech backend producing WAV bytes.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn synthesize(&self, text: &str, options: SpeechOptions) -> Result<Vec<u8>>;
}

/// Generation options for imageGeneration nodes.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub style: Option<String>,
}

/// Pluggable image backend producing PNG bytes.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate(&self, prompt: &str, options: ImageOptions) -> Result<Vec<u8>>;
}

/// Bundle of services handed to every execution context.
#[derive(Clone)]
pub struct Services {
    pub artifacts: Arc<ArtifactStore>,
    pub llm: Option<Arc<dyn LlmService>>,
    pub python: Option<Arc<dyn PythonRuntime>>,
    pub speech: Option<Arc<dyn SpeechService>>,
    pub image: Option<Arc<dyn ImageService>>,
}

impl Services {
    /// A bundle with only the artifact store wired.
    pub fn with_artifacts(artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            artifacts,
            llm: None,
            python: None,
            speech: None,
            image: None,
        }
    }
}
