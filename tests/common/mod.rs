//! Shared fixtures: workflow builders and mock service backends.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use iosans::artifact::ArtifactStore;
use iosans::error::{EngineError, Result};
use iosans::runtime::engine::ExecutionEngine;
use iosans::runtime::registry::ExecutorRegistry;
use iosans::services::{
    ChatRequest, ChatResponse, ImageOptions, ImageService, LlmService, PythonRuntime, Services,
    SpeechOptions, SpeechService,
};
use iosans::workflow::types::Workflow;

/// Parse a JSON document into a workflow, panicking on malformed fixtures.
pub fn wf(doc: Value) -> Workflow {
    serde_json::from_value(doc).expect("fixture workflow")
}

/// Engine with an in-memory artifact store and no optional backends.
pub async fn engine() -> Arc<ExecutionEngine> {
    engine_with(|_| {}).await
}

/// Engine with an in-memory artifact store and caller-tuned services.
pub async fn engine_with(tune: impl FnOnce(&mut Services)) -> Arc<ExecutionEngine> {
    let artifacts = Arc::new(ArtifactStore::in_memory().await.expect("artifact store"));
    let mut services = Services::with_artifacts(artifacts);
    tune(&mut services);
    ExecutionEngine::new(
        Arc::new(ExecutorRegistry::with_builtins()),
        Arc::new(services),
    )
}

/// Scripted LLM backend: returns canned replies in order. With
/// `repeating`, the last reply is served forever.
pub struct MockLlm {
    replies: Mutex<VecDeque<String>>,
    repeat_last: bool,
}

impl MockLlm {
    pub fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            repeat_last: false,
        })
    }

    pub fn repeating(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([reply.to_string()])),
            repeat_last: true,
        })
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        let mut replies = self.replies.lock().expect("mock lock");
        let reply = if self.repeat_last {
            replies.front().cloned()
        } else {
            replies.pop_front()
        };
        let content = reply
            .ok_or_else(|| EngineError::ServiceUnavailable("mock LLM exhausted".to_string()))?;
        Ok(ChatResponse {
            content,
            model: "mock".to_string(),
            usage: None,
        })
    }
}

/// Python backend that doubles `inputs.x`; anything else echoes inputs.
pub struct DoublingPython;

#[async_trait]
impl PythonRuntime for DoublingPython {
    async fn run(&self, _code: &str, inputs: Value) -> Result<Value> {
        match inputs.get("x").and_then(|x| x.as_f64()) {
            Some(x) => Ok(json!(x * 2.0)),
            None => Ok(inputs),
        }
    }
}

/// Speech backend producing a minimal RIFF/WAVE payload.
pub struct MockSpeech;

#[async_trait]
impl SpeechService for MockSpeech {
    async fn synthesize(&self, _text: &str, _options: SpeechOptions) -> Result<Vec<u8>> {
        let mut bytes = Vec::from(*b"RIFF");
        bytes.extend_from_slice(&[0x24, 0, 0, 0]);
        bytes.extend_from_slice(b"WAVEfmt ");
        Ok(bytes)
    }
}

/// Image backend producing a PNG-signature payload.
pub struct MockImage;

#[async_trait]
impl ImageService for MockImage {
    async fn generate(&self, _prompt: &str, _options: ImageOptions) -> Result<Vec<u8>> {
        Ok(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00])
    }
}
