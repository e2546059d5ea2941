use scrobble_sync_config::ConfigError;
use scrobble_sync_destinations::DestinationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode store snapshot: {0}")]
    Encode(#[from] bincode::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Destination(#[from] DestinationError),
}
