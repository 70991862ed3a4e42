//! Custom error types for aislogger.
//!
//! Transport and storage failures carry the endpoint or path they happened
//! on so that the supervisor and the diagnostic channel can report them
//! without extra context plumbing.

use std::io;
use thiserror::Error;

/// Main error type for aislogger operations.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// Configuration-related errors (parsing, validation, missing files)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network I/O errors (bind/connect failures, socket errors)
    #[error("Network error on endpoint '{endpoint}': {source}")]
    Network {
        /// Address of the endpoint that failed
        endpoint: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Serial port errors (device not found, permission denied, hardware issues)
    #[error("Serial port error on '{device}': {source}")]
    Serial {
        /// Path to the serial device
        device: String,
        /// Underlying serial error
        #[source]
        source: tokio_serial::Error,
    },

    /// Persistence errors (log files, identity database, remark file)
    #[error("Storage error at '{path}': {source}")]
    Storage {
        /// Path that caused the error
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Serialization errors for the identity database
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sentence decoding errors surfaced outside the hub
    #[error("Decode error: {0}")]
    Decode(#[from] crate::decode::DecodeError),

    /// Other unexpected errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Type alias for Results that use LoggerError
pub type Result<T> = std::result::Result<T, LoggerError>;

impl LoggerError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new network error
    pub fn network(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create a new serial error
    pub fn serial(device: impl Into<String>, source: tokio_serial::Error) -> Self {
        Self::Serial {
            device: device.into(),
            source,
        }
    }

    /// Create a serial error from an I/O failure on an open port
    pub fn serial_io(device: impl Into<String>, source: io::Error) -> Self {
        Self::serial(device, tokio_serial::Error::from(source))
    }

    /// Create a new storage error
    pub fn storage(path: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<anyhow::Error> for LoggerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

impl From<io::Error> for LoggerError {
    fn from(err: io::Error) -> Self {
        Self::Network {
            endpoint: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<tokio_serial::Error> for LoggerError {
    fn from(err: tokio_serial::Error) -> Self {
        Self::Serial {
            device: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for LoggerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = LoggerError::storage(
            "/var/log/ais/position.csv",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("/var/log/ais/position.csv"));
        assert!(text.contains("denied"));
    }

    #[test]
    fn test_serial_write_failure_is_a_serial_error() {
        let err = LoggerError::serial_io(
            "/dev/ttyUSB1",
            io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"),
        );
        assert!(matches!(
            &err,
            LoggerError::Serial { device, source }
                if device == "/dev/ttyUSB1"
                    && source.kind() == tokio_serial::ErrorKind::Io(io::ErrorKind::BrokenPipe)
        ));
        assert!(err.to_string().starts_with("Serial port error on '/dev/ttyUSB1'"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_chain() {
        let inner = anyhow::anyhow!("socket closed").context("relay write failed");
        let err: LoggerError = inner.into();
        assert_eq!(
            err.to_string(),
            "Internal error: relay write failed: socket closed"
        );
    }
}
