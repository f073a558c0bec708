//! Error handling for SerialVis-RS
//!
//! This module defines the error type shared by the transports, the
//! connection supervisor and the configuration layer, plus a Result alias.
//!
//! The supervisor never escalates any of these to the caller: unavailable
//! devices are retried, link failures trigger a reconnect, and anything else is
//! logged and skipped. The classification helpers ([`SerialVisError::is_unavailable`],
//! [`SerialVisError::is_link_failure`]) are what drive those decisions.

use thiserror::Error;

/// Main error type for SerialVis-RS operations
#[derive(Error, Debug)]
pub enum SerialVisError {
    /// The device is absent or busy at open time
    #[error("Device {port} unavailable: {reason}")]
    TransportUnavailable { port: String, reason: String },

    /// The link failed while it was open
    #[error("Transport I/O error: {0}")]
    TransportIo(String),

    /// A read failed in a way that says nothing about the link itself
    #[error("Unexpected fault: {0}")]
    Fault(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SerialVisError>,
    },
}

impl SerialVisError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SerialVisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an unavailable-device error
    pub fn unavailable(port: impl Into<String>, reason: impl ToString) -> Self {
        SerialVisError::TransportUnavailable {
            port: port.into(),
            reason: reason.to_string(),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &SerialVisError {
        match self {
            SerialVisError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True if the device was not available to open (retry with backoff)
    pub fn is_unavailable(&self) -> bool {
        matches!(self.root(), SerialVisError::TransportUnavailable { .. })
    }

    /// True if an open link has failed and must be torn down
    ///
    /// [`SerialVisError::Fault`] is not a link failure: the link stays open and
    /// the read loop carries on.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self.root(),
            SerialVisError::TransportIo(_) | SerialVisError::Io(_)
        )
    }
}

impl From<serialport::Error> for SerialVisError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::Io(kind) => {
                SerialVisError::Io(std::io::Error::new(kind, err.description))
            }
            _ => SerialVisError::TransportIo(err.description),
        }
    }
}

impl From<toml::de::Error> for SerialVisError {
    fn from(err: toml::de::Error) -> Self {
        SerialVisError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SerialVisError {
    fn from(err: toml::ser::Error) -> Self {
        SerialVisError::Serialization(err.to_string())
    }
}

/// Result type alias for SerialVis-RS operations
pub type Result<T> = std::result::Result<T, SerialVisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SerialVisError::TransportIo("device reports readiness but returned no data".to_string());
        assert_eq!(
            err.to_string(),
            "Transport I/O error: device reports readiness but returned no data"
        );
    }

    #[test]
    fn test_unavailable_display() {
        let err = SerialVisError::unavailable("/dev/ttyUSB0", "No such file or directory");
        assert!(err.to_string().contains("/dev/ttyUSB0"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn test_error_with_context() {
        let err = SerialVisError::Config("bad baud".to_string());
        let with_ctx = err.with_context("Failed to load config");
        assert!(with_ctx.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_classification_sees_through_context() {
        let err = SerialVisError::unavailable("COM3", "busy").with_context("open");
        assert!(err.is_unavailable());
        assert!(!err.is_link_failure());

        let err = SerialVisError::TransportIo("unplugged".into()).with_context("read");
        assert!(err.is_link_failure());
        assert!(!err.is_unavailable());

        let err = SerialVisError::Fault("driver hiccup".into());
        assert!(!err.is_link_failure());
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_io_error_is_link_failure() {
        let err: SerialVisError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(err.is_link_failure());
    }
}
