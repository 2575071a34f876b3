/// Image generation executor
///
/// Resolves the prompt from the input value, `inputs.prompt`, or the
/// node's `prompt` config, renders through the image service, and returns
/// the stored artifact by reference.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{EngineError, Result};
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;
use crate::services::ImageOptions;

pub struct ImageGenerationExecutor;

#[async_trait]
impl NodeRunner for ImageGenerationExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let service = ctx
            .services
            .image
            .as_ref()
            .ok_or_else(|| {
                EngineError::ServiceUnavailable("no image backend configured".to_string())
            })?
            .clone();

        let prompt = ctx
            .inputs
            .as_str()
            .or_else(|| ctx.inputs.get("prompt").and_then(|p| p.as_str()))
            .or_else(|| ctx.data_str("prompt"))
            .map(str::to_string)
            .ok_or_else(|| EngineError::InvalidInput("no image prompt".to_string()))?;

        let options = ImageOptions {
            width: ctx.data_u64("width").map(|w| w as u32),
            height: ctx.data_u64("height").map(|h| h as u32),
            style: ctx.data_str("style").map(str::to_string),
        };

        let image = tokio::select! {
            result = service.generate(&prompt, options) => result?,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        };

        let artifact_id = ctx
            .services
            .artifacts
            .save(image, "image", Some("image/png"))
            .await?;

        Ok(ExecutorOutput::value(json!({
            "artifactId": artifact_id,
            "type": "image/png",
        })))
    }
}
