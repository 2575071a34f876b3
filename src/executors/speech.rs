/// Text-to-speech executor
///
/// Resolves the text from the input value, `inputs.text`, or the node's
/// own `text` config, synthesizes audio through the speech service, and
/// returns the stored artifact by reference.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;
use crate::services::SpeechOptions;

pub struct TextToSpeechExecutor;

#[async_trait]
impl NodeRunner for TextToSpeechExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let service = ctx
            .services
            .speech
            .as_ref()
            .ok_or_else(|| {
                EngineError::ServiceUnavailable("no speech backend configured".to_string())
            })?
            .clone();

        let text = ctx
            .inputs
            .as_str()
            .or_else(|| ctx.inputs.get("text").and_then(|t| t.as_str()))
            .or_else(|| ctx.data_str("text"))
            .map(str::to_string)
            .ok_or_else(|| EngineError::InvalidInput("no input text to speak".to_string()))?;

        let options = SpeechOptions {
            voice: ctx.data_str("voice").map(str::to_string),
            rate: ctx.data_f64("rate"),
            pitch: ctx.data_f64("pitch"),
        };

        let audio = tokio::select! {
            result = service.synthesize(&text, options) => result?,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        let artifact_id = ctx
            .services
            .artifacts
            .save(audio, "audio", Some("audio/wav"))
            .await?;

        Ok(ExecutorOutput::value(json!({
            "artifactId": artifact_id,
            "type": "audio/wav",
        })))
    }
}
