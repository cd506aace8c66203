//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// `--serial` requested from a build without serial support
    #[cfg_attr(feature = "serial", allow(dead_code))]
    #[error("Serial range finder support not compiled in (rebuild with --features serial)")]
    SerialUnavailable,

    /// Device or lifecycle failure while running
    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
