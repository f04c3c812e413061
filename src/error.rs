//! Error types for Parikrama.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParikramaError {
    /// Transport-level failure talking to the scanner. Fatal for the
    /// running scan: commands are never retried.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The scanner answered but refused the command.
    #[error("Device rejected {endpoint}: HTTP {status}")]
    Device { endpoint: String, status: u16 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video stream error: {0}")]
    Video(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ParikramaError {
    fn from(err: reqwest::Error) -> Self {
        ParikramaError::Connection(err.to_string())
    }
}

impl From<toml::de::Error> for ParikramaError {
    fn from(err: toml::de::Error) -> Self {
        ParikramaError::Config(err.to_string())
    }
}

impl From<image::ImageError> for ParikramaError {
    fn from(err: image::ImageError) -> Self {
        ParikramaError::Video(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ParikramaError>;
