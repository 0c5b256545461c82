//! Configuration for relayd.
//!
//! Built once at startup: defaults, then the optional TOML file named by
//! `RELAY_CONFIG`, then environment variables. The result is passed down
//! explicitly; nothing reads the environment after startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an optional TOML config file
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

/// Completion-service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Absent key disables completion enhancement
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_completion_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_upstream_timeout() -> u64 {
    10
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    300
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_completion_endpoint(),
            model: default_completion_model(),
            timeout_secs: default_upstream_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Knowledge-base settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path to the credential JSON; absent disables lookups
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            default_language: default_language(),
            timeout_secs: default_upstream_timeout(),
        }
    }
}

/// Push-notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Path to the credential JSON; absent disables notifications
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Bodies longer than this are truncated with an ellipsis
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_body_limit() -> usize {
    relay_shared::notification::MAX_BODY_CHARS
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            timeout_secs: default_upstream_timeout(),
            body_limit: default_body_limit(),
        }
    }
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Sweep threshold, not a hard bound
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_ttl() -> u64 {
    30 * 60
}

fn default_cache_capacity() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public URL of this deployment, pinged by the keep-alive task
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub keep_alive_enabled: bool,

    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_secs: u64,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_port() -> u16 {
    3000
}

fn default_keep_alive_interval() -> u64 {
    14 * 60
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_url: None,
            keep_alive_enabled: false,
            keep_alive_interval_secs: default_keep_alive_interval(),
            completion: CompletionConfig::default(),
            knowledge: KnowledgeConfig::default(),
            push: PushConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load config for the running process
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from_path(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables; `get` abstracts the environment for tests
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(url) = get("BASE_URL") {
            self.base_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(mode) = get("RELAY_ENV") {
            self.keep_alive_enabled = mode.eq_ignore_ascii_case("production");
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Some(model) = get("COMPLETION_MODEL") {
            self.completion.model = model;
        }
        if let Some(path) = get("KB_CREDENTIALS") {
            self.knowledge.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("PUSH_CREDENTIALS") {
            self.push.credentials_path = Some(PathBuf::from(path));
        }
    }

    pub fn completion_enabled(&self) -> bool {
        self.completion
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}
