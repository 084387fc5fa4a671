//! Runtime configuration.
//!
//! Loaded from a TOML file when one is supplied; otherwise defaults plus
//! the environment-variable provider chain. Every value is explicit in
//! the loaded struct and threaded into the components that need it; no
//! module reads configuration globally.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CodingError, CodingResult};
use crate::llm::{provider_config_from_env, LlmProviderConfig};

/// Fan-out tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Upper bound on concurrently running expert handlers.
    pub max_parallel_experts: usize,
    /// Per-handler timeout; a timeout counts as a handler failure.
    pub expert_timeout_seconds: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_parallel_experts: 8,
            expert_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartcodeConfig {
    pub provider: LlmProviderConfig,
    pub pipeline: PipelineSettings,
    pub db_path: String,
}

impl Default for ChartcodeConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderConfig::default(),
            pipeline: PipelineSettings::default(),
            db_path: "chartcode.sqlite".to_string(),
        }
    }
}

impl ChartcodeConfig {
    pub fn from_file(path: &Path) -> CodingResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CodingError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw)
            .map_err(|e| CodingError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// File config when given, defaults otherwise; in both cases an
    /// unconfigured provider falls back to the environment key chain
    /// (OPENAI_API_KEY, ANTHROPIC_API_KEY, OPENROUTER_API_KEY).
    pub fn load(path: Option<&Path>) -> CodingResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if config.provider.api_key.is_none() {
            if let Some(env_provider) = provider_config_from_env() {
                config.provider = env_provider;
            }
        }
        Ok(config)
    }
}
