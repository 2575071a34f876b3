/// Configuration management for the Iosans engine
///
/// Handles server settings, the data directory for sqlite persistence,
/// and the optional LLM backend used by llm/aiAgent nodes.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub storage: StorageConfig,
    /// Optional LLM backend configuration
    pub llm: LlmConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the sqlite database holding the workflow document
    /// and the artifact index (default: "data")
    pub data_dir: String,
}

/// LLM backend configuration (OpenAI-compatible chat endpoint)
///
/// When `base_url` is unset, llm and aiAgent nodes fail with
/// ServiceUnavailable instead of reaching for a network backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Default model id used when a node does not set `modelId`
    pub model: String,
}

impl Default for Config {
    /// Default configuration with env-var overrides for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("IOSANS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("IOSANS_PORT")
                    .unwrap_or_else(|_| "3020".to_string())
                    .parse()
                    .unwrap_or(3020),
            },
            storage: StorageConfig {
                data_dir: std::env::var("IOSANS_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            llm: LlmConfig {
                base_url: std::env::var("IOSANS_LLM_BASE_URL").ok(),
                api_key: std::env::var("IOSANS_LLM_API_KEY").ok(),
                model: std::env::var("IOSANS_LLM_MODEL")
                    .unwrap_or_else(|_| "llama-3.1-8b-instruct".to_string()),
            },
        }
    }
}
