//! Error types for the fanlog pipeline.
//!
//! All fallible initialization and control-plane operations return
//! [`FanlogError`]. Failures on the export data path are deliberately *not*
//! represented here: they are classified by the transport, retried or
//! counted, and never surfaced to the code that emitted the record.

use thiserror::Error;

/// Main error type for fanlog operations
#[derive(Error, Debug)]
pub enum FanlogError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// Invalid severity name in configuration
    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),

    /// I/O errors (sink writes, config file reads)
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Transport construction or control errors
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Channel communication errors (worker gone, ack dropped)
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Shutdown-related errors
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

/// Result type alias for fanlog operations
pub type Result<T> = std::result::Result<T, FanlogError>;

impl FanlogError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a new channel error
    pub fn channel<S: Into<String>>(msg: S) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a new shutdown error
    pub fn shutdown<S: Into<String>>(msg: S) -> Self {
        Self::ShutdownError(msg.into())
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IoError { .. } => true,
            Self::TransportError(_) => true,
            Self::ChannelError(_) => true,
            Self::ConfigError(_)
            | Self::ConfigFileMissing(_)
            | Self::InvalidSeverity(_)
            | Self::SerializationError { .. }
            | Self::TomlError { .. }
            | Self::ShutdownError(_) => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_) | Self::ConfigFileMissing(_) | Self::InvalidSeverity(_) => {
                "config"
            }
            Self::IoError { .. } => "io",
            Self::SerializationError { .. } | Self::TomlError { .. } => "serialization",
            Self::TransportError(_) => "transport",
            Self::ChannelError(_) => "channel",
            Self::ShutdownError(_) => "shutdown",
        }
    }
}
