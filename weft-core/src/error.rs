//! Error types for weft-core

use thiserror::Error;

/// Main error type for the weft-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed payload on a recognized event
    #[error("malformed payload for {name}: {message}")]
    Payload { name: String, message: String },

    /// Control-plane API error (snapshot fetch, outbound actions)
    #[error("control-plane error: {0}")]
    Api(String),

    /// Event-stream transport error
    #[error("stream error: {0}")]
    Stream(String),
}

impl Error {
    /// Build a payload error for the given event name.
    pub fn payload(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Payload {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for weft-core
pub type Result<T> = std::result::Result<T, Error>;
