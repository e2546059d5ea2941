use crate::error::ConfigError;
use scrobble_sync_models::Destination;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Destinations activity is synchronized to, in dispatch order
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub trakt: Option<TraktConfig>,
    #[serde(default)]
    pub letterboxd: Option<LetterboxdConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth redirect URI registered with the application
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

/// Session cookies copied from a logged-in browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LetterboxdConfig {
    #[serde(default)]
    pub user_cookie: Option<String>,
    #[serde(default)]
    pub csrf_cookie: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json_logging")]
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
            file: None,
        }
    }
}

fn default_redirect_url() -> String {
    "urn:ietf:wg:oauth:2.0:oob".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    use std::io::IsTerminal;
    !std::io::stdout().is_terminal()
}

fn is_placeholder(value: &str) -> bool {
    value.trim().is_empty() || value.starts_with("YOUR_")
}

impl LetterboxdConfig {
    /// Both cookies present and non-empty
    pub fn session(&self) -> Option<(&str, &str)> {
        let user = self.user_cookie.as_deref().filter(|v| !v.trim().is_empty())?;
        let csrf = self.csrf_cookie.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((user, csrf))
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::io(path, e))?;
        Ok(())
    }

    /// Reject duplicate destinations and half-filled credentials.
    ///
    /// A destination that is enabled but has no credentials at all is valid:
    /// its calls are reported as `not configured` at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::new();
        for destination in &self.destinations {
            if seen.contains(destination) {
                return Err(ConfigError::Invalid(format!(
                    "destination listed twice: {}",
                    destination
                )));
            }
            seen.push(*destination);
        }

        if let Some(ref trakt) = self.trakt {
            if is_placeholder(&trakt.client_id) {
                return Err(ConfigError::Invalid("trakt client_id is not configured".to_string()));
            }
            if is_placeholder(&trakt.client_secret) {
                return Err(ConfigError::Invalid(
                    "trakt client_secret is not configured".to_string(),
                ));
            }
        }

        if let Some(ref letterboxd) = self.letterboxd {
            if letterboxd.user_cookie.is_some() != letterboxd.csrf_cookie.is_some() {
                return Err(ConfigError::Invalid(
                    "letterboxd needs both user_cookie and csrf_cookie".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn is_trakt_configured(&self) -> bool {
        self.trakt
            .as_ref()
            .map_or(false, |t| !is_placeholder(&t.client_id) && !is_placeholder(&t.client_secret))
    }

    pub fn is_letterboxd_configured(&self) -> bool {
        self.letterboxd.as_ref().map_or(false, |l| l.session().is_some())
    }

    /// Enabled destinations in insertion order, duplicates dropped
    pub fn enabled_destinations(&self) -> Vec<Destination> {
        let mut enabled = Vec::new();
        for destination in &self.destinations {
            if !enabled.contains(destination) {
                enabled.push(*destination);
            }
        }
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn config() -> Config {
        Config {
            destinations: vec![Destination::Trakt, Destination::Letterboxd],
            trakt: Some(TraktConfig {
                client_id: "test_id".to_string(),
                client_secret: "test_secret".to_string(),
                redirect_url: "https://sync.example/redirect".to_string(),
            }),
            letterboxd: Some(LetterboxdConfig {
                user_cookie: Some("user".to_string()),
                csrf_cookie: Some("csrf".to_string()),
            }),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        config().save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.trakt.as_ref().unwrap().client_id, "test_id");
        assert_eq!(loaded.destinations, vec![Destination::Trakt, Destination::Letterboxd]);
        assert!(loaded.is_letterboxd_configured());
    }

    #[test]
    fn test_config_parses_minimal_toml() {
        let loaded: Config = toml::from_str(
            r#"
            destinations = ["letterboxd"]

            [trakt]
            client_id = "id"
            client_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(loaded.enabled_destinations(), vec![Destination::Letterboxd]);
        assert_eq!(loaded.trakt.unwrap().redirect_url, "urn:ietf:wg:oauth:2.0:oob");
        assert_eq!(loaded.logging.level, "info");
        assert!(loaded.letterboxd.is_none());
    }

    #[test]
    fn test_config_validate() {
        let mut config = config();
        assert!(config.validate().is_ok());
        assert!(config.is_trakt_configured());

        config.trakt.as_mut().unwrap().client_id = "YOUR_CLIENT_ID".to_string();
        assert!(config.validate().is_err());
        assert!(!config.is_trakt_configured());

        let mut config = self::config();
        config.destinations.push(Destination::Trakt);
        assert!(config.validate().is_err());

        let mut config = self::config();
        config.letterboxd = Some(LetterboxdConfig {
            user_cookie: Some("user".to_string()),
            csrf_cookie: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_destinations_keeps_order() {
        let mut config = config();
        config.destinations = vec![Destination::Letterboxd, Destination::Trakt, Destination::Letterboxd];
        assert_eq!(
            config.enabled_destinations(),
            vec![Destination::Letterboxd, Destination::Trakt]
        );
    }

    #[test]
    fn test_letterboxd_session_requires_both_cookies() {
        let empty = LetterboxdConfig {
            user_cookie: Some("user".to_string()),
            csrf_cookie: Some("  ".to_string()),
        };
        assert_eq!(empty.session(), None);
        assert_eq!(LetterboxdConfig::default().session(), None);
    }
}
