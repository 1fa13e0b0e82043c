//! Chat-completion provider implementations

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Supported LLM providers. Both speak the OpenAI chat-completions shape;
/// they differ in authentication and a few body fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    Mimo,
    OpenAI,
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mimo" | "xiaomi" => Ok(LlmProvider::Mimo),
            "openai" | "gpt" => Ok(LlmProvider::OpenAI),
            _ => anyhow::bail!("Unknown LLM provider: {}. Use 'mimo' or 'openai'", s),
        }
    }
}

impl LlmProvider {
    fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::Mimo => "MIMO_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key (can use env var like ${MIMO_API_KEY})
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "mimo".to_string()
}

fn default_base_url() -> String {
    "https://api.xiaomimimo.com/v1".to_string()
}

fn default_model() -> String {
    "mimo-v2-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout() -> u64 {
    15
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Response from a chat-completions endpoint
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the configured chat-completions endpoint
pub struct LlmClient {
    provider: LlmProvider,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a new client from configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let provider: LlmProvider = config.provider.parse()?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(provider.api_key_var()).ok())
            .with_context(|| {
                format!(
                    "API key not found. Set llm.api_key or the {} environment variable",
                    provider.api_key_var()
                )
            })?;

        let api_key = shellexpand::env(&api_key)
            .with_context(|| format!("Could not expand llm.api_key '{}'", api_key))?
            .into_owned();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    /// Send a conversation and return the first choice's text
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.client.post(&url).json(&self.request_body(messages));

        let request = match self.provider {
            LlmProvider::Mimo => request.header("api-key", &self.api_key),
            LlmProvider::OpenAI => request.bearer_auth(&self.api_key),
        };

        tracing::debug!(model = %self.model, "POST {}", url);
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error ({}): {}", status, error_text);
        }

        let body = response
            .text()
            .await
            .context("Failed to read LLM response")?;
        parse_completion(&body)
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        match self.provider {
            LlmProvider::Mimo => json!({
                "model": self.model,
                "messages": messages,
                "max_completion_tokens": self.max_tokens,
                "temperature": self.temperature,
                "top_p": 0.95,
                "stream": false,
                "thinking": { "type": "disabled" },
            }),
            LlmProvider::OpenAI => json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            }),
        }
    }
}

/// Text of the first choice; an empty choice list gives an empty string
fn parse_completion(body: &str) -> Result<String> {
    let result: CompletionResponse =
        serde_json::from_str(body).context("Failed to parse LLM response")?;

    Ok(result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}
