//! LLM provider abstraction.
//!
//! Every internal consumer sees one operation, `generate_text`, returning a
//! single normalized text value. Whatever shape the upstream API responds
//! with (choice arrays, content blocks) is flattened here at the boundary;
//! nothing past this module ever inspects response shape.
//!
//! Model and sampling configuration travel inside `LlmProviderConfig` and
//! are cloned into every consumer, so concurrent calls are independent and
//! deterministic under test. There is no global model state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CodingError, CodingResult};

/// Configuration for LLM providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub provider_type: LlmProviderType,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: LlmProviderType::Stub,
            model: "stub-model".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(2048),
            temperature: Some(0.2),
            timeout_seconds: Some(30),
        }
    }
}

/// Supported LLM provider types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LlmProviderType {
    /// Deterministic responses for testing.
    Stub,
    /// OpenAI-compatible APIs (OpenAI, OpenRouter).
    OpenAI,
    Anthropic,
}

/// Normalized completion value: the only thing that crosses the boundary.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub text: String,
}

/// Abstract interface for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text from a prompt. May fail on transport errors; callers
    /// performing fan-out tolerate and isolate such failures.
    async fn generate_text(&self, prompt: &str) -> CodingResult<String>;

    fn get_info(&self) -> LlmProviderInfo;
}

#[derive(Debug, Clone)]
pub struct LlmProviderInfo {
    pub name: String,
    pub model: String,
}

/// OpenAI-compatible provider (works with OpenAI and OpenRouter).
pub struct OpenAiProvider {
    config: LlmProviderConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: LlmProviderConfig) -> CodingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.timeout_seconds.unwrap_or(30),
            ))
            .build()
            .map_err(|e| CodingError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn make_request(&self, prompt: &str) -> CodingResult<InferenceResult> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| CodingError::Config("API key required for OpenAI provider".to_string()))?;

        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        let url = format!("{}/chat/completions", base_url);

        let request_body = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CodingError::Inference(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            return Err(CodingError::Inference(format!(
                "API request failed: {}",
                raw_body
            )));
        }

        let response_body: OpenAiResponse = serde_json::from_str(&raw_body)
            .map_err(|e| CodingError::Inference(format!("failed to parse response: {}", e)))?;

        let text = response_body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CodingError::Inference("LLM response missing choices".to_string()))?;

        Ok(InferenceResult { text })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_text(&self, prompt: &str) -> CodingResult<String> {
        let completion = self.make_request(prompt).await?;
        Ok(completion.text)
    }

    fn get_info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "OpenAI LLM Provider".to_string(),
            model: self.config.model.clone(),
        }
    }
}

// OpenAI API types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    config: LlmProviderConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: LlmProviderConfig) -> CodingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.timeout_seconds.unwrap_or(30),
            ))
            .build()
            .map_err(|e| CodingError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn make_request(&self, prompt: &str) -> CodingResult<InferenceResult> {
        let api_key = self.config.api_key.as_ref().ok_or_else(|| {
            CodingError::Config("API key required for Anthropic provider".to_string())
        })?;

        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.anthropic.com/v1");
        let url = format!("{}/messages", base_url);

        let request_body = AnthropicRequest {
            model: self.config.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens.unwrap_or(2048),
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CodingError::Inference(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if !status.is_success() {
            return Err(CodingError::Inference(format!(
                "API request failed: {}",
                raw_body
            )));
        }

        let response_body: AnthropicResponse = serde_json::from_str(&raw_body)
            .map_err(|e| CodingError::Inference(format!("failed to parse response: {}", e)))?;

        let text = response_body
            .content
            .first()
            .map(|item| item.text.clone())
            .ok_or_else(|| CodingError::Inference("LLM response missing content".to_string()))?;

        Ok(InferenceResult { text })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate_text(&self, prompt: &str) -> CodingResult<String> {
        let completion = self.make_request(prompt).await?;
        Ok(completion.text)
    }

    fn get_info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "Anthropic LLM Provider".to_string(),
            model: self.config.model.clone(),
        }
    }
}

// Anthropic API types
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

pub mod stub;

pub use stub::StubProvider;

/// Factory for creating providers from configuration.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    pub fn create_provider(
        config: LlmProviderConfig,
    ) -> CodingResult<Box<dyn LlmProvider + Send + Sync>> {
        match config.provider_type {
            LlmProviderType::Stub => Ok(Box::new(StubProvider::new(config))),
            LlmProviderType::OpenAI => Ok(Box::new(OpenAiProvider::new(config)?)),
            LlmProviderType::Anthropic => Ok(Box::new(AnthropicProvider::new(config)?)),
        }
    }
}

/// Build a provider config from environment variables.
/// Tries OPENAI_API_KEY, then ANTHROPIC_API_KEY, then OPENROUTER_API_KEY.
/// Returns None if no API key is configured.
pub fn provider_config_from_env() -> Option<LlmProviderConfig> {
    if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
        return Some(LlmProviderConfig {
            provider_type: LlmProviderType::OpenAI,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_key: Some(api_key),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            ..Default::default()
        });
    }

    if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
        return Some(LlmProviderConfig {
            provider_type: LlmProviderType::Anthropic,
            model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string()),
            api_key: Some(api_key),
            base_url: None,
            ..Default::default()
        });
    }

    if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY") {
        // OpenRouter uses an OpenAI-compatible API
        return Some(LlmProviderConfig {
            provider_type: LlmProviderType::OpenAI,
            model: std::env::var("OPENROUTER_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3.5-haiku".to_string()),
            api_key: Some(api_key),
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            ..Default::default()
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_stub() {
        let provider = LlmProviderFactory::create_provider(LlmProviderConfig::default()).unwrap();
        assert_eq!(provider.get_info().name, "Stub LLM Provider");
    }

    #[test]
    fn test_openai_provider_requires_no_key_at_construction() {
        // Key absence fails at request time, not construction, so offline
        // wiring (tests, dry runs) can still build the object graph.
        let config = LlmProviderConfig {
            provider_type: LlmProviderType::OpenAI,
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        assert!(OpenAiProvider::new(config).is_ok());
    }
}
