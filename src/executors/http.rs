/// HTTP request executor
///
/// Issues one outbound request. URL and string bodies support `{{var}}`
/// substitution from the gathered inputs; object bodies are sent as JSON
/// with the matching content type. Bodies are suppressed for GET/HEAD.
/// Non-2xx responses fail the node with `HTTP <code>: <reason>`; the
/// optional `timeoutMs` config surfaces as a Timeout error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::executors::transform::render_template;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::NodeRunner;

pub struct HttpRequestExecutor {
    client: reqwest::Client,
}

impl HttpRequestExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeRunner for HttpRequestExecutor {
    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.data_str("url").map_or(true, str::is_empty) {
            return Err(EngineError::InvalidInput(
                "httpRequest node requires a url".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutorOutput> {
        let method = ctx
            .data_str("method")
            .unwrap_or("GET")
            .to_ascii_uppercase();
        let url = render_template(ctx.data_str("url").unwrap_or_default(), &ctx.inputs);

        let mut builder = match method.as_str() {
            "GET" => self.client.get(&url),
            "HEAD" => self.client.head(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "PATCH" => self.client.patch(&url),
            "DELETE" => self.client.delete(&url),
            other => {
                return Err(EngineError::InvalidInput(format!(
                    "unsupported HTTP method: {other}"
                )))
            }
        };

        if let Some(headers) = ctx.node_data.get("headers").and_then(|h| h.as_object()) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    builder = builder.header(name, value);
                }
            }
        }

        if !matches!(method.as_str(), "GET" | "HEAD") {
            match ctx.node_data.get("body") {
                Some(Value::String(text)) => {
                    builder = builder.body(render_template(text, &ctx.inputs));
                }
                Some(body @ (Value::Object(_) | Value::Array(_))) => {
                    builder = builder
                        .header("Content-Type", "application/json")
                        .json(body);
                }
                _ => {}
            }
        }

        if let Some(timeout_ms) = ctx.data_u64("timeoutMs") {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        let response = tokio::select! {
            result = builder.send() => result,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        }
        .map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout(format!("{method} {url}"))
            } else {
                EngineError::ExternalError(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::ExternalError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown")
            )));
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let text = tokio::select! {
            result = response.text() => result,
            _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
        }
        .map_err(|e| EngineError::ExternalError(format!("failed to read response body: {e}")))?;

        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(ExecutorOutput::value(json!({
            "status": status.as_u16(),
            "headers": headers,
            "data": data,
        })))
    }
}
