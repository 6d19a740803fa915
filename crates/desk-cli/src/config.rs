//! Configuration file support

use desk_ai::RetryConfig;
use desk_flow::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for desk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat completions endpoint
    pub base_url: Option<String>,
    /// Chat model
    pub model: Option<String>,
    /// Embedding model
    pub embedding_model: Option<String>,
    pub temperature: Option<f32>,
    /// API key (alternative to environment variables)
    pub api_key: Option<String>,
    /// Pre-embedded JSONL evidence corpus
    pub corpus_path: Option<PathBuf>,
    /// Where threads and tickets are kept
    pub data_dir: Option<PathBuf>,
    /// Owner recorded on created tickets
    pub user_id: Option<String>,
    pub retry: RetrySettings,
    pub workflow: EngineConfig,
}

/// Backoff settings for model calls, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            backoff_multiplier: defaults.backoff_multiplier,
            jitter_ms: defaults.jitter.as_millis() as u64,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
            jitter: Duration::from_millis(settings.jitter_ms),
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("desk")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DESK_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(desk_ai::providers::openai::DEFAULT_BASE_URL.to_string()),
            model: Some(desk_ai::providers::openai::DEFAULT_MODEL.to_string()),
            embedding_model: Some(desk_ai::providers::openai::DEFAULT_EMBEDDING_MODEL.to_string()),
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Data directory, defaulting to the platform's local data dir
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("desk")
        })
    }

    pub fn user_id(&self) -> String {
        self.user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    /// API key from config, then the environment
    pub fn api_key(&self) -> desk_ai::Result<String> {
        desk_ai::providers::get_api_key(
            self.api_key.as_deref(),
            &desk_ai::providers::openai::API_KEY_ENV_VARS,
        )
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# desk configuration file
# Place at ~/.config/desk/config.toml (Linux/Mac) or %APPDATA%\desk\config.toml (Windows)
# or point DESK_CONFIG_PATH at it

# Any OpenAI-compatible endpoint
base_url = "https://api.mistral.ai/v1"
model = "mistral-large-latest"
embedding_model = "mistral-embed"
temperature = 0.2

# API key (optional - DESK_API_KEY, MISTRAL_API_KEY or OPENAI_API_KEY also work)
# api_key = "..."

# Pre-embedded policy passages, one JSON object per line:
# {"department": "HR", "text": "...", "embedding": [0.1, ...]}
# corpus_path = "~/desk/corpus.jsonl"

# Conversation threads and tickets are stored here
# data_dir = "~/.local/share/desk"

# Owner recorded on created tickets
# user_id = "alice"

[retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 2.0
jitter_ms = 1000

[workflow]
router_confidence_floor = 0.55
validation_top_k = 1
# What declining a multi-ticket confirmation resets: "reset_task" or "clear_queue"
decline_policy = "reset_task"
max_transitions = 256

[workflow.retrieval]
threshold = 0.82
top_k = 3

[workflow.cache]
enabled = true
threshold = 0.80
"#
}
