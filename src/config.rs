// src/config.rs
use std::env;

use thiserror::Error;

use crate::llm_provider::LlmSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OpenAI API key не найден: задайте OPENAI_KEY или OPENAI_API_KEY в окружении или .env")]
    MissingApiKey,
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub llm: LlmSettings,
}

impl ApiConfig {
    /// Loads everything from the environment in one pass. A missing
    /// credential is a hard error here so the process halts before any
    /// listener binds, never a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("BACKEND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("BACKEND_PORT", 3010u16)?;

        let api_key = env::var("OPENAI_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let defaults = LlmSettings::default();
        let llm = LlmSettings {
            api_key,
            base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: env::var("LLM_MODEL").unwrap_or(defaults.model),
            temperature: parse_or("LLM_TEMPERATURE", defaults.temperature)?,
            max_output_tokens: parse_or("LLM_MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?,
        };

        Ok(Self { host, port, llm })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        Err(_) => Ok(default),
    }
}
