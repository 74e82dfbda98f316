use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gemini-3-pro-preview".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_error_dismiss_secs")]
    pub error_dismiss_secs: u64,
    /// Forces the initial theme. When unset the terminal hint is used.
    #[serde(default)]
    pub prefer_dark: Option<bool>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            error_dismiss_secs: default_error_dismiss_secs(),
            prefer_dark: None,
        }
    }
}

fn default_error_dismiss_secs() -> u64 {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            ai: AiConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Whether the session should start dark when there is no snapshot.
    ///
    /// `ui.prefer_dark` wins; otherwise the `COLORFGBG` terminal hint is read.
    pub fn prefers_dark(&self) -> bool {
        self.ui
            .prefer_dark
            .unwrap_or_else(|| host_prefers_dark(std::env::var("COLORFGBG").ok().as_deref()))
    }
}

/// Interpret a `COLORFGBG` value (`"fg;bg"` or `"fg;default;bg"`).
/// Background colors 0-6 and 8 are dark.
pub fn host_prefers_dark(colorfgbg: Option<&str>) -> bool {
    colorfgbg
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .map(|bg| bg <= 6 || bg == 8)
        .unwrap_or(false)
}

/// Load the config file, or [`Config::minimal`] when it does not exist.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.ai.model.trim().is_empty() {
        anyhow::bail!("ai.model must not be empty");
    }
    if config.ai.api_key_env.trim().is_empty() {
        anyhow::bail!("ai.api_key_env must not be empty");
    }
    if config.ai.timeout_secs == 0 {
        anyhow::bail!("ai.timeout_secs must be > 0");
    }
    if !config.ai.base_url.starts_with("http://") && !config.ai.base_url.starts_with("https://") {
        anyhow::bail!("ai.base_url must be an http(s) URL");
    }
    if config.ui.error_dismiss_secs == 0 {
        anyhow::bail!("ui.error_dismiss_secs must be > 0");
    }
    Ok(())
}
