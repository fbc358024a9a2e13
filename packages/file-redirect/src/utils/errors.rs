// packages/file-redirect/src/utils/errors.rs
//! Error types for the redirect shim

use thiserror::Error;

/// Errors raised by the redirect shim
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The empty stand-in for a target file could not be created.
    /// Never leaves the policy engine: it degrades to the null device.
    #[error("failed to create substitute resource: {0}")]
    SubstituteResourceCreationFailed(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("interception unavailable: {0}")]
    HookUnavailable(String),

    #[error("failed to launch process: {0}")]
    LaunchFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for RedirectError {
    fn from(e: config::ConfigError) -> Self {
        RedirectError::ConfigError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RedirectError>;
