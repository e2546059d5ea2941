pub mod config;
pub mod error;
pub mod paths;
pub mod settings;

pub use config::{Config, LetterboxdConfig, LoggingConfig, StorageConfig, TraktConfig};
pub use error::ConfigError;
pub use paths::{container_base_path, PathManager};
pub use settings::{SettingsStore, TokenRecord};
