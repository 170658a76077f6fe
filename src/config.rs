//! Configuration loader and validator for the product cloner.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::shopee::{PartnerCredentials, PlatformKind};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub profiles: Profiles,
    pub shopee: ShopeeConfig,
    pub web: Web,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub profiles_path: String,
    #[serde(default)]
    pub platform: PlatformKind,
}

/// Where shop profiles may come from besides the JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profiles {
    /// Environment variable holding the JSON-encoded profile map. Takes
    /// precedence over `app.profiles_path` when set.
    pub secret_var: String,
}

/// Shopee Open Platform endpoint settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShopeeConfig {
    pub base_url: String,
    pub redirect_url: String,
    pub request_timeout_secs: u64,
    /// Default partner credentials offered by the authorization utility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_key: Option<String>,
}

impl std::fmt::Debug for ShopeeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopeeConfig")
            .field("base_url", &self.base_url)
            .field("redirect_url", &self.redirect_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("partner_id", &self.partner_id)
            .field("partner_key", &self.partner_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Web form front end settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Web {
    pub bind: String,
}

impl Config {
    pub fn profiles_path(&self) -> PathBuf {
        PathBuf::from(&self.app.profiles_path)
    }

    /// Partner credentials configured as defaults, if both halves are present.
    pub fn default_partner(&self) -> Option<PartnerCredentials> {
        match (self.shopee.partner_id, self.shopee.partner_key.as_deref()) {
            (Some(id), Some(key)) if !key.trim().is_empty() => {
                Some(PartnerCredentials::new(id, key.to_string()))
            }
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str(example()).expect("valid example config")
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Like [`load`], but falls back to the built-in defaults when the file does
/// not exist. Parse and validation errors still fail.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if !path.exists() {
        warn!(path = %path.display(), "config file not found; using built-in defaults");
        return Ok(Config::default());
    }
    load(Some(path))
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.profiles_path.trim().is_empty() {
        return Err(ConfigError::Invalid("app.profiles_path must be non-empty"));
    }
    if cfg.profiles.secret_var.trim().is_empty() {
        return Err(ConfigError::Invalid("profiles.secret_var must be non-empty"));
    }

    let base = cfg.shopee.base_url.trim();
    if base.is_empty() {
        return Err(ConfigError::Invalid("shopee.base_url must be non-empty"));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(ConfigError::Invalid("shopee.base_url must be an http(s) URL"));
    }
    if url::Url::parse(base).is_err() {
        return Err(ConfigError::Invalid("shopee.base_url must be a valid URL"));
    }
    if cfg.shopee.redirect_url.trim().is_empty() {
        return Err(ConfigError::Invalid("shopee.redirect_url must be non-empty"));
    }
    if cfg.shopee.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("shopee.request_timeout_secs must be > 0"));
    }
    if let Some(id) = cfg.shopee.partner_id {
        if id <= 0 {
            return Err(ConfigError::Invalid("shopee.partner_id must be positive"));
        }
    }

    if cfg.web.bind.trim().is_empty() {
        return Err(ConfigError::Invalid("web.bind must be non-empty"));
    }

    Ok(())
}

/// Returns the reference YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  profiles_path: "./users.json"
  platform: shopee

profiles:
  secret_var: "shopee_profiles"

shopee:
  base_url: "https://partner.shopeemobile.com"
  redirect_url: "https://your-registered-redirect-url.com/callback"
  request_timeout_secs: 30

web:
  bind: "127.0.0.1:8501"
"#
}
