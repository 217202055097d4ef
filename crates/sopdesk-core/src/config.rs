//! Application configuration management.
//!
//! Two layers live here:
//! - `ClientConfig`: the backend origin and default headers the API client
//!   applies to every request.
//! - `Config`: persisted user settings (API URL override, last email used,
//!   credential backend), stored at `~/.config/sopdesk/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sopdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the backend origin
pub const API_URL_ENV: &str = "SOPDESK_API_URL";

/// Origin and default headers for every request the client sends.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub default_headers: HeaderMap,
}

impl ClientConfig {
    /// Build a config for `base_url` with the JSON content-type default
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(Self {
            base_url,
            default_headers,
        })
    }

    /// Read the origin from `SOPDESK_API_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_env_value(std::env::var(API_URL_ENV).ok())
    }

    fn from_env_value(value: Option<String>) -> Result<Self> {
        match value {
            Some(url) if !url.trim().is_empty() => Self::new(&url),
            _ => Err(anyhow::anyhow!("{} is not set", API_URL_ENV)),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name: {}", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header {}", name.as_str()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Resolve a request path against the base origin.
    ///
    /// Paths are always relative to the base, so a base of
    /// `https://host/backend` plus `/auth/users/me/` keeps the `/backend`
    /// prefix. Absolute URLs pass through untouched.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).with_context(|| format!("Invalid URL: {}", path));
        }

        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).with_context(|| format!("Invalid URL: {}", joined))
    }
}

/// Where the bearer token is kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    Keyring,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Backend origin: the environment wins over the saved setting
    pub fn resolve_api_url(&self) -> Result<String> {
        Self::pick_api_url(std::env::var(API_URL_ENV).ok(), self.api_url.as_deref())
    }

    fn pick_api_url(env: Option<String>, saved: Option<&str>) -> Result<String> {
        env.filter(|url| !url.trim().is_empty())
            .or_else(|| saved.map(str::to_string))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No API URL configured. Set {} or add api_url to the config file",
                    API_URL_ENV
                )
            })
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        ClientConfig::new(&self.resolve_api_url()?)
    }
}
