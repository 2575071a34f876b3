/// ReAct tool-calling loop
///
/// Drives an LLM through Thought / Action / Action Input / Observation
/// turns until it produces a Final Answer. Tools are workflow nodes wired
/// to an agent's resource slot; dispatch goes back through the engine's
/// re-entrant `execute_node` so tool runs share the parent's services and
/// cancellation without touching the run's status map.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngineError, Result};
use crate::services::llm::{ChatMessage, ChatRequest, LlmService};

/// JSON-Schema-shaped tool description advertised to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// `{type: "object", properties: {...}, required: [...]}`
    pub parameters: Value,
}

/// A discovered tool: its schema plus the workflow node that backs it.
#[derive(Debug, Clone)]
pub struct ToolBinding {
    pub schema: ToolSchema,
    pub node_id: String,
}

/// Dispatch target for parsed actions.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Invoke a workflow node as a tool via engine re-entry.
    async fn dispatch(&self, node_id: &str, input: Value) -> Result<Value>;

    /// Invoke a built-in executor by type tag (no backing node).
    async fn dispatch_builtin(&self, type_tag: &str, input: Value) -> Result<Value>;
}

/// One entry in the agent trace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    #[serde(rename = "type")]
    pub kind: AgentStepKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStepKind {
    Thought,
    Action,
    Observation,
    Answer,
}

/// Result of one ReAct run.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub response: String,
    pub steps: Vec<AgentStep>,
    /// True when the loop stopped at the iteration bound without a
    /// Final Answer.
    pub limit_hit: bool,
}

/// Default iteration bound for the loop.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// The ReAct loop runner.
pub struct ToolCallingService {
    tools: HashMap<String, ToolBinding>,
    max_iterations: usize,
    action_re: Regex,
    action_input_re: Regex,
    final_re: Regex,
}

impl ToolCallingService {
    pub fn new(tools: Vec<ToolBinding>, max_iterations: usize) -> Self {
        let tools = tools
            .into_iter()
            .map(|binding| (binding.schema.name.clone(), binding))
            .collect();
        Self {
            tools,
            max_iterations: max_iterations.max(1),
            action_re: Regex::new(r"(?m)^Action:\s*(.+)$").expect("static pattern"),
            action_input_re: Regex::new(r"(?m)^Action Input:\s*(.+)$").expect("static pattern"),
            final_re: Regex::new(r"(?ms)^Final Answer:\s*(.+)$").expect("static pattern"),
        }
    }

    /// The tool preamble plus the ReAct protocol contract.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are an assistant that can use tools to complete the user's request.\n\n\
             ## Available tools\n\n",
        );

        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        for name in names {
            let binding = &self.tools[name];
            prompt.push_str(&format!(
                "### {}\n{}\n",
                binding.schema.name, binding.schema.description
            ));
            if let Some(props) = binding
                .schema
                .parameters
                .get("properties")
                .and_then(|p| p.as_object())
            {
                prompt.push_str("Parameters:\n");
                for (param, details) in props {
                    let description = details
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or("");
                    prompt.push_str(&format!("- {param}: {description}\n"));
                }
            }
            prompt.push('\n');
        }

        prompt.push_str(
            "## Protocol\n\n\
             Respond using exactly this format:\n\n\
             Thought: what you are thinking about the task\n\
             Action: <tool_name>\n\
             Action Input: <JSON object with the tool parameters>\n\n\
             After each action you will receive a line starting with \
             `Observation:` containing the tool result. Repeat the cycle as \
             needed. When you have the answer, respond with:\n\n\
             Thought: final reasoning\n\
             Final Answer: <your answer to the user>\n",
        );

        prompt
    }

    /// Run the loop for a user prompt.
    pub async fn run(
        &self,
        llm: &dyn LlmService,
        dispatcher: &dyn ToolDispatcher,
        user_prompt: &str,
    ) -> Result<AgentOutcome> {
        let system = ChatMessage::system(self.system_prompt());
        let mut scratchpad = String::new();
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut last_thought = String::new();

        for iteration in 0..self.max_iterations {
            let user_content = if scratchpad.is_empty() {
                user_prompt.to_string()
            } else {
                format!("{user_prompt}\n\n{scratchpad}")
            };

            let reply = llm
                .chat(ChatRequest {
                    messages: vec![system.clone(), ChatMessage::user(user_content)],
                    ..ChatRequest::default()
                })
                .await?
                .content;

            tracing::debug!("🤔 Agent iteration {}: {} chars", iteration + 1, reply.len());

            let thought = extract_thought(&reply);
            if let Some(thought) = &thought {
                last_thought = thought.clone();
            }

            if let Some(fin) = self.final_re.captures(&reply) {
                let answer = fin[1].trim().to_string();
                steps.push(AgentStep {
                    kind: AgentStepKind::Answer,
                    content: answer.clone(),
                    tool_call: None,
                    result: None,
                });
                return Ok(AgentOutcome {
                    response: answer,
                    steps,
                    limit_hit: false,
                });
            }

            let Some(action) = self.action_re.captures(&reply) else {
                // No action and no final answer: take the reply as the answer.
                let answer = reply.trim().to_string();
                steps.push(AgentStep {
                    kind: AgentStepKind::Answer,
                    content: answer.clone(),
                    tool_call: None,
                    result: None,
                });
                return Ok(AgentOutcome {
                    response: answer,
                    steps,
                    limit_hit: false,
                });
            };

            if let Some(thought) = thought {
                steps.push(AgentStep {
                    kind: AgentStepKind::Thought,
                    content: thought,
                    tool_call: None,
                    result: None,
                });
            }

            let tool_name = action[1].trim().to_string();
            let raw_input = self
                .action_input_re
                .captures(&reply)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_default();
            let input: Value = serde_json::from_str(&raw_input)
                .unwrap_or_else(|_| json!({ "input": raw_input.clone() }));

            steps.push(AgentStep {
                kind: AgentStepKind::Action,
                content: raw_input.clone(),
                tool_call: Some(tool_name.clone()),
                result: None,
            });

            let result = match self.tools.get(&tool_name) {
                Some(binding) => dispatcher.dispatch(&binding.node_id, input).await,
                None => match builtin_type_of(&tool_name) {
                    Some(type_tag) => dispatcher.dispatch_builtin(type_tag, input).await,
                    None => Err(EngineError::InvalidInput(format!(
                        "unknown tool: {tool_name}"
                    ))),
                },
            };

            let observation = render_observation(&result);
            steps.push(AgentStep {
                kind: AgentStepKind::Observation,
                content: observation.clone(),
                tool_call: Some(tool_name.clone()),
                result: result.ok(),
            });

            scratchpad.push_str(&format!(
                "Thought: {last_thought}\nAction: {tool_name}\nAction Input: {raw_input}\nObservation: {observation}\n"
            ));
        }

        tracing::warn!(
            "⚠️ Agent hit the iteration limit ({}) without a final answer",
            self.max_iterations
        );
        let response = if last_thought.is_empty() {
            "Stopped after reaching the tool-call limit without a final answer.".to_string()
        } else {
            format!(
                "Stopped after reaching the tool-call limit. Last thought: {last_thought}"
            )
        };
        steps.push(AgentStep {
            kind: AgentStepKind::Answer,
            content: response.clone(),
            tool_call: None,
            result: None,
        });
        Ok(AgentOutcome {
            response,
            steps,
            limit_hit: true,
        })
    }
}

/// The `Thought:` section runs from its marker to the next protocol line
/// (Action or Final Answer) or the end of the reply.
fn extract_thought(reply: &str) -> Option<String> {
    let start = if let Some(stripped) = reply.strip_prefix("Thought:") {
        stripped
    } else {
        let at = reply.find("\nThought:")?;
        &reply[at + "\nThought:".len()..]
    };
    let end = ["\nAction:", "\nFinal Answer:"]
        .iter()
        .filter_map(|marker| start.find(marker))
        .min()
        .unwrap_or(start.len());
    let thought = start[..end].trim();
    (!thought.is_empty()).then(|| thought.to_string())
}

/// Recognize built-in tool names that are not backed by a workflow node,
/// e.g. a bare `python` action.
fn builtin_type_of(tool_name: &str) -> Option<&str> {
    match tool_name {
        "python" => Some("python"),
        "codeExecutor" | "code" => Some("codeExecutor"),
        "httpRequest" | "http" => Some("httpRequest"),
        _ => None,
    }
}

/// Serialize a tool result into an observation line.
fn render_observation(result: &Result<Value>) -> String {
    match result {
        Ok(value) => {
            if let Some(artifact_id) = value.get("artifactId").and_then(|v| v.as_str()) {
                let mime = value.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");
                format!("Success. Artifact created: {artifact_id} (type: {mime})")
            } else {
                serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
            }
        }
        Err(err) => format!("Error: {err}"),
    }
}

/// Synthesize the advertised schema for a tool node.
pub fn schema_for_node(type_tag: &str, node_id: &str, description: Option<&str>) -> ToolSchema {
    let name = format!("{}_{}", type_tag, node_id.replace('-', "_"));
    let (default_description, properties, required) = match type_tag {
        "imageGeneration" => (
            "Generate an image from a text prompt.",
            json!({
                "prompt": {"type": "string", "description": "Image prompt"},
                "style": {"type": "string", "description": "Optional style hint"}
            }),
            json!(["prompt"]),
        ),
        "python" => (
            "Run the node's python script with the given inputs.",
            json!({
                "inputs": {"type": "object", "description": "Values bound as `inputs` in the script"}
            }),
            json!([]),
        ),
        "httpRequest" => (
            "Issue the node's HTTP request.",
            json!({
                "body": {"type": "object", "description": "Request body"},
                "queryParams": {"type": "object", "description": "Query parameters"}
            }),
            json!([]),
        ),
        "textToSpeech" => (
            "Synthesize speech from text.",
            json!({
                "text": {"type": "string", "description": "Text to speak"},
                "voice": {"type": "string", "description": "Voice name"}
            }),
            json!(["text"]),
        ),
        "llm" => (
            "Ask the language model a question.",
            json!({
                "prompt": {"type": "string", "description": "Prompt text"}
            }),
            json!(["prompt"]),
        ),
        _ => (
            "Invoke this workflow node with an input value.",
            json!({
                "input": {"type": "string", "description": "Input value"}
            }),
            json!([]),
        ),
    };

    ToolSchema {
        name,
        description: description.unwrap_or(default_description).to_string(),
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": required
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_replace_dashes() {
        let schema = schema_for_node("python", "node-7f-2", None);
        assert_eq!(schema.name, "python_node_7f_2");
    }

    #[test]
    fn observation_formats_artifacts() {
        let ok: Result<Value> = Ok(json!({"artifactId": "a1", "type": "image/png"}));
        assert_eq!(
            render_observation(&ok),
            "Success. Artifact created: a1 (type: image/png)"
        );
        let err: Result<Value> = Err(EngineError::Timeout("http".to_string()));
        assert_eq!(render_observation(&err), "Error: Timed out: http");
    }

    #[test]
    fn action_parsing_handles_raw_text_input() {
        let service = ToolCallingService::new(Vec::new(), 1);
        let reply = "Thought: try it.\nAction: python\nAction Input: not json at all";
        let action = service.action_re.captures(reply).unwrap();
        assert_eq!(action[1].trim(), "python");
        let raw = service.action_input_re.captures(reply).unwrap()[1].trim().to_string();
        let parsed: Value =
            serde_json::from_str(&raw).unwrap_or_else(|_| json!({ "input": raw }));
        assert_eq!(parsed, json!({"input": "not json at all"}));
    }

    #[test]
    fn thought_capture_stops_before_action() {
        let reply = "Thought: first line\nsecond line\nAction: x\nAction Input: {}";
        assert_eq!(
            extract_thought(reply).as_deref(),
            Some("first line\nsecond line")
        );
        assert_eq!(extract_thought("Final Answer: done"), None);
        assert_eq!(
            extract_thought("preamble\nThought: later\nFinal Answer: done").as_deref(),
            Some("later")
        );
    }
}
