use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::client::LlmClient;
use super::client::MockLlmClient;
use super::client_impl::{OpenAIClient, OLLAMA_BASE_URL, OPENAI_BASE_URL};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Ollama,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "ollama" | "openai-compatible" => Ok(Provider::Ollama),
            unknown => bail!("Unknown LLM provider: {}", unknown),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

impl Provider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAI => OPENAI_BASE_URL,
            Provider::Ollama => OLLAMA_BASE_URL,
        }
    }
}

/// Create an LLM client based on configuration
pub fn create_client(config: &Config, dry_run: bool) -> Result<Box<dyn LlmClient>> {
    if dry_run {
        return Ok(Box::new(MockLlmClient::new()));
    }

    let provider: Provider = config.llm.provider.parse()?;
    let api_key = config.get_api_key()?;
    let base_url = config
        .llm
        .base_url
        .clone()
        .unwrap_or_else(|| provider.default_base_url().to_string());

    debug!("Using {} provider at {}", provider, base_url);
    Ok(Box::new(OpenAIClient::with_base_url(
        api_key,
        config.llm.model.clone(),
        base_url,
        config.llm.get_max_tokens(),
        config.llm.timeout_secs,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!("Ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert_eq!(
            "openai-compatible".parse::<Provider>().unwrap(),
            Provider::Ollama
        );
        assert_eq!(Provider::Ollama.to_string(), "ollama");
        assert_eq!(Provider::Ollama.default_base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn test_create_mock_client_for_dry_run() {
        let mut config = Config::default();
        config.llm.provider = "unknown_provider".to_string();
        // dry runs never look at the provider
        create_client(&config, true).unwrap();
    }

    #[test]
    fn test_create_ollama_client_without_key() {
        let config = Config::default();
        assert!(create_client(&config, false).is_ok());
    }

    #[test]
    #[serial]
    fn test_create_openai_client() {
        env::set_var("TESTSMITH_FACTORY_KEY", "test_key");
        let mut config = Config::default();
        config.llm.provider = "openai".to_string();
        config.llm.api_key_env = Some("TESTSMITH_FACTORY_KEY".to_string());
        assert!(create_client(&config, false).is_ok());
        env::remove_var("TESTSMITH_FACTORY_KEY");
    }

    #[test]
    #[serial]
    fn test_create_client_without_api_key() {
        let mut config = Config::default();
        config.llm.provider = "openai".to_string();
        config.llm.api_key_env = Some("TESTSMITH_TEST_NONEXISTENT_KEY_FACTORY".to_string());
        let err = create_client(&config, false).err().unwrap();
        assert!(err.to_string().contains("API key not found"));
    }

    #[test]
    fn test_create_client_with_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = "unknown_provider".to_string();
        let err = create_client(&config, false).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
