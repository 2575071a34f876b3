/// LLM executor
///
/// One chat completion through the injected LLM service. Inputs may be a
/// plain string, a message list, or an object carrying `messages`;
/// anything else is serialized into a single user message.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;
use crate::services::llm::{ChatMessage, ChatRequest};

pub struct LlmExecutor;

#[async_trait]
impl NodeRunner for LlmExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let service = ctx
            .services
            .llm
            .as_ref()
            .ok_or_else(|| EngineError::ServiceUnavailable("no LLM backend configured".to_string()))?
            .clone();

        let request = ChatRequest {
            model: ctx.data_str("modelId").map(str::to_string),
            messages: messages_from(&ctx.inputs),
            temperature: ctx.data_f64("temperature"),
            top_p: ctx.data_f64("top_p"),
            max_tokens: ctx.data_u64("maxTokens").map(|t| t as u32),
        };

        let response = tokio::select! {
            result = service.chat(request) => result?,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        Ok(ExecutorOutput::value(json!({
            "response": response.content,
            "model": response.model,
            "usage": response.usage,
        })))
    }
}

fn messages_from(inputs: &Value) -> Vec<ChatMessage> {
    match inputs {
        Value::String(text) => vec![ChatMessage::user(text)],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("messages") {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            } else {
                vec![ChatMessage::user(
                    serde_json::to_string(inputs).unwrap_or_default(),
                )]
            }
        }
        other => vec![ChatMessage::user(other.to_string())],
    }
}
