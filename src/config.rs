use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default = "default_upload_field")]
    pub upload_field: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,
    #[serde(default = "default_greeting_delay_ms")]
    pub greeting_delay_ms: u64,
}

/// Optional controller capabilities.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesConfig {
    #[serde(default = "enabled")]
    pub typing_indicator: bool,
    #[serde(default = "enabled")]
    pub image_upload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            upload_path: default_upload_path(),
            upload_field: default_upload_field(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: default_typing_delay_ms(),
            greeting_delay_ms: default_greeting_delay_ms(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            typing_indicator: true,
            image_upload: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&content).context("failed to parse config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.base_url()?;
        for (name, path) in [
            ("server.chat_path", &self.server.chat_path),
            ("server.upload_path", &self.server.upload_path),
        ] {
            if !path.starts_with('/') {
                bail!("{name} must start with '/': {path}");
            }
        }
        if self.server.upload_field.trim().is_empty() {
            bail!("server.upload_field must not be empty");
        }
        if self.server.request_timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid server.base_url: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("server.base_url must be http or https: {}", self.base_url);
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl TimingConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn greeting_delay(&self) -> Duration {
        Duration::from_millis(self.greeting_delay_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_chat_path() -> String {
    "/chat".to_string()
}

fn default_upload_path() -> String {
    "/upload_grocery".to_string()
}

fn default_upload_field() -> String {
    "photo".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_typing_delay_ms() -> u64 {
    1000
}

fn default_greeting_delay_ms() -> u64 {
    500
}

fn enabled() -> bool {
    true
}
