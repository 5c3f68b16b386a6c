use thiserror::Error;

use crate::models::VesselId;

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The game answered but refused the action (e.g. "not enough fuel").
    #[error("rejected by game: {0}")]
    Rejected(String),

    #[error("invalid client setup: {0}")]
    Setup(String),
}

impl ApiError {
    /// Errors worth retrying: the request may not have reached the game.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Departure refusals caused by an empty fuel bunker.
    pub fn is_fuel_insufficient(&self) -> bool {
        let message = match self {
            ApiError::Rejected(message) => message,
            ApiError::Status { body, .. } => body,
            _ => return false,
        };
        let message = message.to_lowercase();
        message.contains("fuel")
            && (message.contains("not enough")
                || message.contains("insufficient")
                || message.contains("no fuel"))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Why a route-settings request could not be applied or stored.
#[derive(Debug, Error)]
pub enum SettingsRequestError {
    #[error("vessel {0} is not in the fleet")]
    UnknownVessel(VesselId),

    #[error("fleet roster unavailable")]
    RosterUnavailable,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure to assemble the controller from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
