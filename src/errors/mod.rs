/// Error types for the relay core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid upstream endpoint '{endpoint}': {reason}")] InvalidEndpoint {
        endpoint: String,
        reason: String,
    },

    #[error("Transport error: {0}")] Transport(String),

    #[error("Protocol error: {0}")] Protocol(String),

    #[error("Connection is closed")] ConnectionClosed,

    #[error("Relay service has stopped")] ServiceStopped,

    #[error("Configuration error: {0}")] Config(String),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")] Serialization(#[from] serde_json::Error),
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::Transport(e.to_string())
    }
}
