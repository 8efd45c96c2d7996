use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// How assistant replies are interpreted: structured JSON embedded in the
/// reply text, or native function calling on the chat-completions API.
///
/// Picked once per deployment. Small local models tend to be more reliable
/// with `EmbeddedJson`; larger hosted models do better with `ToolCalls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodingStrategy {
    EmbeddedJson,
    ToolCalls,
}

impl Default for DecodingStrategy {
    fn default() -> Self {
        DecodingStrategy::EmbeddedJson
    }
}

impl DecodingStrategy {
    pub fn tool_mode(&self) -> bool {
        matches!(self, DecodingStrategy::ToolCalls)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    // LLM configuration (OpenAI-compatible: Ollama, LM Studio, vLLM, OpenAI, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,

    // Sampling
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // Reply interpretation
    #[serde(default)]
    pub strategy: DecodingStrategy,
    #[serde(default)]
    pub strict_json: bool,

    // Conversation window
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

fn default_llm_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_max_history_turns() -> usize {
    20
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            strategy: DecodingStrategy::default(),
            strict_json: false,
            max_history_turns: default_max_history_turns(),
        }
    }
}

impl AssistantConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("daykeeper_config.toml")
    }

    /// Load config from daykeeper_config.toml (next to executable), falling
    /// back to defaults plus environment variables.
    pub fn load() -> Self {
        let path = Self::config_path();

        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                return config;
            }
            Err(e) => {
                if path.exists() {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                }
            }
        }

        tracing::warn!("No config file found, using defaults + env vars");
        Self::from_env()
    }

    /// Load config from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Save config to file (next to executable)
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific TOML file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("LLM_API_URL") {
            config.llm_api_url = url;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            config.llm_model = model;
        }

        if let Ok(key) = env::var("LLM_API_KEY") {
            config.llm_api_key = Some(key);
        }

        if let Ok(temperature) = env::var("DAYKEEPER_TEMPERATURE") {
            if let Ok(value) = temperature.parse() {
                config.temperature = value;
            }
        }

        if let Ok(strategy) = env::var("DAYKEEPER_STRATEGY") {
            match strategy.trim().to_ascii_lowercase().as_str() {
                "tool_calls" => config.strategy = DecodingStrategy::ToolCalls,
                "embedded_json" => config.strategy = DecodingStrategy::EmbeddedJson,
                other => tracing::warn!("Unknown DAYKEEPER_STRATEGY value: {}", other),
            }
        }

        if let Ok(enabled) = env::var("DAYKEEPER_STRICT_JSON") {
            let enabled = enabled.eq_ignore_ascii_case("1")
                || enabled.eq_ignore_ascii_case("true")
                || enabled.eq_ignore_ascii_case("yes");
            config.strict_json = enabled;
        }

        if let Ok(turns) = env::var("DAYKEEPER_MAX_HISTORY_TURNS") {
            if let Ok(count) = turns.parse() {
                config.max_history_turns = count;
            }
        }

        config
    }
}
