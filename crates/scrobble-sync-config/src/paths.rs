use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("SCROBBLE_SYNC_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

#[derive(Debug, Clone)]
pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self, ConfigError> {
        let base_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("scrobble-sync");

        Ok(Self::with_base(base_dir))
    }

    /// Config files at the base, data and logs in subdirectories
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
            config_dir: base,
        }
    }

    pub fn from_docker_env() -> Self {
        Self::with_base(container_base_path())
    }

    /// Override the data and log directories from `[storage]` config.
    pub fn with_overrides(mut self, data_dir: Option<&Path>, log_dir: Option<&Path>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir.to_path_buf();
        }
        if let Some(dir) = log_dir {
            self.log_dir = dir.to_path_buf();
        }
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }

    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join("store.bin")
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.config_dir, &self.data_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;
        }
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The container base directory only exists inside the image
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}
