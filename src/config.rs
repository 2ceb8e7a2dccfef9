use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::llm::factory::Provider;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub model: String,
    pub api_key_env: Option<String>,
    /// Overrides the provider's default endpoint (OpenAI-compatible gateways)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Completion budget; unset means 16384 for ollama and 4096 otherwise
    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "codestral:22b".to_string(),
            api_key_env: None,
            base_url: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Completion budget for the configured provider
    pub fn get_max_tokens(&self) -> u32 {
        if let Some(tokens) = self.max_tokens {
            return tokens;
        }
        match self.provider.parse::<Provider>() {
            Ok(Provider::Ollama) => 16384,
            _ => 4096,
        }
    }
}

/// Prompt sections used when the command line does not supply them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_instructions")]
    pub general_instructions: String,
    #[serde(default = "default_requirements")]
    pub requirements: String,
}

fn default_context() -> String {
    "You are an expert Solidity auditor writing Hardhat unit tests in JavaScript.".to_string()
}

fn default_instructions() -> String {
    "Use Hardhat, ethers and Chai. Return the complete test file in a single ```javascript block."
        .to_string()
}

fn default_requirements() -> String {
    "Cover deployment, every public function, access control, reverts and emitted events."
        .to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            general_instructions: default_instructions(),
            requirements: default_requirements(),
        }
    }
}

impl Config {
    /// Load config from the working directory or user config directory
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Load from `path`, else ./testsmith.toml, else the user config dir, else defaults
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        // An explicit path must exist and parse
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path);
        }

        if let Ok(config) = Self::load_from_path("testsmith.toml") {
            debug!("Loaded config from ./testsmith.toml");
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("testsmith").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the API key named by `api_key_env`; empty when none is needed
    pub fn get_api_key(&self) -> Result<String> {
        match &self.llm.api_key_env {
            Some(env_var) => {
                // "none" means no API key needed
                if env_var.to_lowercase() == "none" {
                    return Ok(String::new());
                }

                // Local models don't need keys, but gateways in front of them might
                if self.llm.provider == "ollama" {
                    return Ok(env::var(env_var).unwrap_or_default());
                }

                env::var(env_var).map_err(|_| {
                    anyhow::anyhow!("API key not found in environment variable: {}", env_var)
                })
            }
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, "codestral:22b");
        assert_eq!(config.llm.api_key_env, None);
        assert_eq!(config.llm.timeout_secs, 300);
        assert!(config.generation.general_instructions.contains("```javascript"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("provider = \"ollama\""));
        assert!(toml_str.contains("[generation]"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
"#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.timeout_secs, 300);
        assert_eq!(config.generation.requirements, default_requirements());
    }

    #[test]
    #[serial]
    fn test_api_key_from_env() {
        env::set_var("TESTSMITH_TEST_API_KEY", "test_key_123");
        let mut config = Config::default();
        config.llm.provider = "openai".to_string();
        config.llm.api_key_env = Some("TESTSMITH_TEST_API_KEY".to_string());

        let api_key = config.get_api_key().unwrap();
        assert_eq!(api_key, "test_key_123");

        env::remove_var("TESTSMITH_TEST_API_KEY");
    }

    #[test]
    #[serial]
    fn test_api_key_missing_fails() {
        let mut config = Config::default();
        config.llm.provider = "openai".to_string();
        config.llm.api_key_env = Some("TESTSMITH_NONEXISTENT_KEY_XYZ".to_string());

        assert!(config.get_api_key().is_err());
    }

    #[test]
    #[serial]
    fn test_api_key_optional_for_ollama() {
        let mut config = Config::default();
        config.llm.api_key_env = Some("TESTSMITH_NONEXISTENT_KEY_OLLAMA".to_string());
        assert_eq!(config.get_api_key().unwrap(), "");

        config.llm.api_key_env = Some("none".to_string());
        assert_eq!(config.get_api_key().unwrap(), "");
    }

    #[test]
    fn test_max_tokens_provider_defaults() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.get_max_tokens(), 16384);

        llm.provider = "openai".to_string();
        assert_eq!(llm.get_max_tokens(), 4096);

        llm.max_tokens = Some(2000);
        assert_eq!(llm.get_max_tokens(), 2000);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let err = Config::load_with_path(Some("/nonexistent/testsmith.toml".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_partial_llm_table() {
        let config: Config = toml::from_str("[llm]\nmodel = \"qwen2.5-coder:7b\"\n").unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, "qwen2.5-coder:7b");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "[generation]\ncontext = \"Audit context\"\n",
        )
        .unwrap();
        let config = Config::load_with_path(Some(path.display().to_string())).unwrap();
        assert_eq!(config.generation.context, "Audit context");
        assert_eq!(config.llm.provider, "ollama");
    }
}
