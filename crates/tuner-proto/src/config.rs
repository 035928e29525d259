use serde::{Deserialize, Serialize};

use super::identity::User;
use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
    /// Signed-in user as provided by the host environment.  Absent means
    /// anonymous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where the station directory comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Queried first, with an `Origin` header.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Queried once if the primary fails.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            fallback_url: default_fallback_url(),
            country_code: default_country_code(),
            limit: default_limit(),
            origin: default_origin(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

fn default_primary_url() -> String {
    "https://all.api.radio-browser.info".to_string()
}

fn default_fallback_url() -> String {
    "https://de1.api.radio-browser.info".to_string()
}

fn default_country_code() -> String {
    "in".to_string()
}

fn default_limit() -> u32 {
    1300
}

fn default_origin() -> String {
    "http://localhost".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("tuner/{}", env!("CARGO_PKG_VERSION"))
}

fn default_volume() -> f32 {
    0.7
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> std::path::PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            directory: DirectoryConfig::default(),
            mpv: MpvConfig::default(),
            user: None,
        }
    }
}
