//! Error types and handlers for registry and migration operations

pub mod handlers;

use std::fmt;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Network related errors
    Network(String),
    /// Registry related errors
    Registry(String),
    /// Authentication errors
    Auth(String),
    /// File IO errors
    Io(String),
    /// Parse errors
    Parse(String),
    /// Configuration and argument validation errors
    Validation(String),
    /// Image transfer errors
    Transfer(String),
    /// Request timed out
    Timeout(String),
    /// Resource not found
    NotFound(String),
    /// Worker pool errors
    Pool(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Network(msg) => write!(f, "Network error: {}", msg),
            RegistryError::Registry(msg) => write!(f, "Registry error: {}", msg),
            RegistryError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            RegistryError::Io(msg) => write!(f, "IO error: {}", msg),
            RegistryError::Parse(msg) => write!(f, "Parse error: {}", msg),
            RegistryError::Validation(msg) => write!(f, "Validation error: {}", msg),
            RegistryError::Transfer(msg) => write!(f, "Transfer error: {}", msg),
            RegistryError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            RegistryError::NotFound(msg) => write!(f, "Not found: {}", msg),
            RegistryError::Pool(msg) => write!(f, "Worker pool error: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Network(err.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}

impl From<crate::config::ConfigError> for RegistryError {
    fn from(err: crate::config::ConfigError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(err: tokio::task::JoinError) -> Self {
        RegistryError::Pool(format!("worker task did not complete: {}", err))
    }
}
