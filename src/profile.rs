//! Named shop credential bundles, persisted as one flat JSON object.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::shopee::PartnerCredentials;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed profile store: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("profile '{0}' not found")]
    NotFound(String),
    #[error("profile name must be non-empty")]
    EmptyName,
    #[error("image hosting URL must be an absolute http(s) URL, got '{0}'")]
    InvalidHostingUrl(String),
    #[error("profiles were loaded from the '{0}' secret and cannot be saved")]
    ReadOnly(String),
}

/// Credentials and settings for one authorized shop.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShopProfile {
    pub shop_id: i64,
    pub partner_id: i64,
    pub partner_key: String,
    pub access_token: String,
    pub refresh_token: String,
    pub shop_name: String,
    /// Stored under `hosting_url`, the key the shared profile file uses.
    #[serde(rename = "hosting_url", alias = "image_hosting_url")]
    pub image_hosting_url: String,
}

impl fmt::Debug for ShopProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopProfile")
            .field("shop_id", &self.shop_id)
            .field("partner_id", &self.partner_id)
            .field("shop_name", &self.shop_name)
            .field("image_hosting_url", &self.image_hosting_url)
            .finish_non_exhaustive()
    }
}

impl ShopProfile {
    pub fn partner(&self) -> PartnerCredentials {
        PartnerCredentials::new(self.partner_id, self.partner_key.clone())
    }

    /// Strip trailing slashes so derived image URLs never contain `//`.
    pub fn normalized(mut self) -> Self {
        self.image_hosting_url = normalize_hosting_url(&self.image_hosting_url);
        self
    }
}

pub fn normalize_hosting_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// The trimmed profile name, rejected when blank.
pub fn validate_name(name: &str) -> Result<&str, ProfileError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProfileError::EmptyName);
    }
    Ok(name)
}

/// Normalized hosting URL. Must parse as an http(s) URL with a host.
pub fn validate_hosting_url(raw: &str) -> Result<String, ProfileError> {
    let normalized = normalize_hosting_url(raw);
    match url::Url::parse(&normalized) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(normalized),
        _ => Err(ProfileError::InvalidHostingUrl(raw.trim().to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    File(PathBuf),
    Secret(String),
}

/// In-memory view of every saved profile, loaded in full.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    source: Source,
    profiles: BTreeMap<String, ShopProfile>,
}

impl ProfileStore {
    /// Load from the configured secret variable if it is set, otherwise from
    /// the profiles file.
    pub fn from_config(cfg: &Config) -> Result<Self, ProfileError> {
        let secret = std::env::var(&cfg.profiles.secret_var).ok();
        Self::resolve(cfg.profiles_path(), &cfg.profiles.secret_var, secret.as_deref())
    }

    pub fn resolve(
        path: PathBuf,
        secret_name: &str,
        secret: Option<&str>,
    ) -> Result<Self, ProfileError> {
        match secret.filter(|s| !s.trim().is_empty()) {
            Some(json) => {
                let store = Self::from_secret(secret_name, json)?;
                info!(secret = secret_name, count = store.len(), "loaded profiles from secret");
                Ok(store)
            }
            None => Self::load(path),
        }
    }

    pub fn from_secret(secret_name: &str, json: &str) -> Result<Self, ProfileError> {
        Ok(Self {
            source: Source::Secret(secret_name.to_string()),
            profiles: serde_json::from_str(json)?,
        })
    }

    /// Read the JSON file at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let profiles = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no profile store yet");
                BTreeMap::new()
            }
            Err(source) => return Err(ProfileError::Io { path, source }),
        };
        Ok(Self {
            source: Source::File(path),
            profiles,
        })
    }

    pub fn save(&self) -> Result<(), ProfileError> {
        let path = match &self.source {
            Source::File(path) => path,
            Source::Secret(name) => return Err(ProfileError::ReadOnly(name.clone())),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ProfileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.profiles)?;
        fs::write(path, json).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), count = self.len(), "saved profiles");
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(path) => Some(path),
            Source::Secret(_) => None,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.source, Source::Secret(_))
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ShopProfile)> {
        self.profiles.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Result<&ShopProfile, ProfileError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    /// Add or replace a profile. Returns the profile it replaced, if any.
    pub fn insert(
        &mut self,
        name: &str,
        profile: ShopProfile,
    ) -> Result<Option<ShopProfile>, ProfileError> {
        let name = validate_name(name)?;
        Ok(self.profiles.insert(name.to_string(), profile.normalized()))
    }

    pub fn remove(&mut self, name: &str) -> Result<ShopProfile, ProfileError> {
        self.profiles
            .remove(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
