use thiserror::Error;

#[derive(Debug, Error)]
pub enum DestinationError {
    /// Credentials or tokens are missing; nothing was sent
    #[error("destination not configured: {0}")]
    Configuration(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("remote service answered {status}: {message}")]
    Remote { status: u16, message: String },

    /// The remote markup or payload no longer has the expected shape
    #[error("unexpected remote contract: {0}")]
    ContractDrift(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DestinationError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, DestinationError::Configuration(_))
    }
}
