//! Layered error definitions
//!
//! Categorized by source: config / device / lifecycle

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Device could not be opened or failed its warm-up read.
    ///
    /// Fatal for the owning source only.
    #[error("device open error for '{device}': {message}")]
    DeviceOpen { device: String, message: String },

    /// A single read failed; the loop logs it and carries on
    #[error("transient read error on '{device}': {message}")]
    TransientRead { device: String, message: String },

    /// Range response could not be parsed into a distance
    #[error("parse error on '{device}': {message}")]
    Parse { device: String, message: String },

    // ===== Lifecycle Errors =====
    /// Operation called in the wrong lifecycle state
    #[error("lifecycle error in '{component}': {message}")]
    Lifecycle { component: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device open error
    pub fn device_open(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceOpen {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create transient read error
    pub fn transient_read(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientRead {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create range response parse error
    pub fn parse(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create lifecycle misuse error
    pub fn lifecycle(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the error is absorbed by a source loop instead of surfacing
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRead { .. } | Self::Parse { .. })
    }
}
