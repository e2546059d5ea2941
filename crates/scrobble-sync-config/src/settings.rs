use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use scrobble_sync_models::Destination;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// OAuth token record as returned by the ratings service token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, counted from `created_at`
    pub expires_in: i64,
    /// Unix timestamp
    pub created_at: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenRecord {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .checked_add(self.expires_in)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// A record with an unrepresentable expiry counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expires_at| now >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct SettingsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Key-value settings persisted as TOML.
///
/// Holds the runtime-togglable set of enabled destinations and the stored
/// OAuth token records.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: HashMap<String, String>,
}

const SERVICES_KEY: &str = "services";

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            settings: HashMap::new(),
        }
    }

    /// Create a store and load it from disk if the file exists.
    pub fn open(path: PathBuf) -> Result<Self, ConfigError> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&mut self) -> Result<(), ConfigError> {
        if self.path.exists() {
            let content =
                std::fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
            let data: SettingsData = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: self.path.clone(),
                source: e,
            })?;
            self.settings = data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let data = SettingsData {
            data: self.settings.clone(),
        };
        let content = toml::to_string_pretty(&data)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, content).map_err(|e| ConfigError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.settings.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.settings.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.settings.remove(key);
    }

    /// Destinations toggled on at runtime, in the order they were saved.
    ///
    /// `None` when the setting was never written; unknown names are skipped.
    pub fn enabled_destinations(&self) -> Option<Vec<Destination>> {
        let raw = self.get(SERVICES_KEY)?;
        let mut destinations = Vec::new();
        for name in raw.split(',').filter(|name| !name.trim().is_empty()) {
            if let Ok(destination) = name.parse::<Destination>() {
                if !destinations.contains(&destination) {
                    destinations.push(destination);
                }
            }
        }
        Some(destinations)
    }

    pub fn set_enabled_destinations(&mut self, destinations: &[Destination]) {
        let joined = destinations
            .iter()
            .map(Destination::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.set(SERVICES_KEY.to_string(), joined);
    }

    pub fn token(&self, destination: Destination) -> Option<TokenRecord> {
        let key = |field: &str| format!("{}_{}", destination.as_str(), field);
        let access_token = self.get(&key("access_token"))?.clone();
        let expires_in = self.get(&key("expires_in"))?.parse().ok()?;
        let created_at = self.get(&key("created_at"))?.parse().ok()?;

        Some(TokenRecord {
            access_token,
            refresh_token: self.get(&key("refresh_token")).cloned(),
            expires_in,
            created_at,
            token_type: self.get(&key("token_type")).cloned(),
            scope: self.get(&key("scope")).cloned(),
        })
    }

    pub fn set_token(&mut self, destination: Destination, token: &TokenRecord) {
        self.clear_token(destination);
        let key = |field: &str| format!("{}_{}", destination.as_str(), field);
        self.set(key("access_token"), token.access_token.clone());
        self.set(key("expires_in"), token.expires_in.to_string());
        self.set(key("created_at"), token.created_at.to_string());
        if let Some(ref refresh_token) = token.refresh_token {
            self.set(key("refresh_token"), refresh_token.clone());
        }
        if let Some(ref token_type) = token.token_type {
            self.set(key("token_type"), token_type.clone());
        }
        if let Some(ref scope) = token.scope {
            self.set(key("scope"), scope.clone());
        }
    }

    pub fn clear_token(&mut self, destination: Destination) {
        for field in [
            "access_token",
            "refresh_token",
            "expires_in",
            "created_at",
            "token_type",
            "scope",
        ] {
            self.remove(&format!("{}_{}", destination.as_str(), field));
        }
    }
}
