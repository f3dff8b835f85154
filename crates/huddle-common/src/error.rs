//! Common error types for Huddle.
//!
//! None of these surface from the public core operations: the locator,
//! tracker and registry turn them into fallback values at their boundary.

use thiserror::Error;

/// Result type alias using Huddle's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Huddle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, file, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed wire data (STUN, candidate lines, echo bodies)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Remote endpoint unreachable or returned an error status
    #[error("network error: {0}")]
    Network(String),

    /// Operation timed out
    #[error("timeout: {0}")]
    Timeout(String),

    /// Platform capability (audio analysis, network probing) unavailable
    #[error("capability unavailable: {0}")]
    Capability(String),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a network error from any displayable type.
    pub fn network(msg: impl std::fmt::Display) -> Self {
        Self::Network(msg.to_string())
    }

    /// Create a timeout error from any displayable type.
    pub fn timeout(msg: impl std::fmt::Display) -> Self {
        Self::Timeout(msg.to_string())
    }

    /// Create a capability error from any displayable type.
    pub fn capability(msg: impl std::fmt::Display) -> Self {
        Self::Capability(msg.to_string())
    }

    /// Whether this error came from a bounded wait expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_format_message() {
        let err = Error::timeout("candidate probe after 3s");
        assert_eq!(err.to_string(), "timeout: candidate probe after 3s");
        assert!(err.is_timeout());

        let err = Error::capability("fft size 100");
        assert_eq!(err.to_string(), "capability unavailable: fft size 100");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no route");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
