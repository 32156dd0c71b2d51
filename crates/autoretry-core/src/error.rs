//! Error types for autoretry-core

use thiserror::Error;

/// Result type alias using autoretry-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for autoretry
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller supplied request key is already in flight
    #[error("Request key already in flight: {key}")]
    DuplicateRequestKey { key: String },

    /// Retry execution requires a tokio runtime
    #[error("No tokio runtime available to drive retries")]
    NoRuntime,

    /// The retry controller has been shut down
    #[error("Retry controller has been shut down")]
    ControllerShutdown,
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a duplicate request key error
    pub fn duplicate_request_key(key: impl Into<String>) -> Self {
        Self::DuplicateRequestKey { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_display() {
        let err = Error::duplicate_request_key("upload-avatar");
        assert_eq!(
            err.to_string(),
            "Request key already in flight: upload-avatar"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let err = Error::invalid_config("AUTORETRY_DEFAULT_RETRIES must be a valid number");
        assert!(err.to_string().contains("AUTORETRY_DEFAULT_RETRIES"));
    }
}
