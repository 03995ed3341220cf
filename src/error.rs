//! Error types for Pathweave.

use std::io;

use thiserror::Error;

/// Result type alias for Pathweave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Pathweave.
#[derive(Error, Debug)]
pub enum Error {
    // Routing errors
    #[error("no healthy path available")]
    NoHealthyPath,

    #[error("path {path} out of range (router has {count} paths)")]
    PathOutOfRange { path: usize, count: usize },

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Input errors
    #[error("trace line {line}: {reason}")]
    Trace { line: usize, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if the error is fatal at startup (must stop before any packet
    /// is processed).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidConfig(_))
    }

    /// Check if the error only affects a single packet.
    pub fn is_per_packet(&self) -> bool {
        matches!(self, Error::NoHealthyPath | Error::PathOutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidConfig("paths = 0".into()).is_fatal());
        assert!(!Error::NoHealthyPath.is_fatal());
        assert!(Error::NoHealthyPath.is_per_packet());
        assert!(Error::PathOutOfRange { path: 9, count: 4 }.is_per_packet());
    }

    #[test]
    fn test_error_display() {
        let err = Error::PathOutOfRange { path: 9, count: 4 };
        assert_eq!(err.to_string(), "path 9 out of range (router has 4 paths)");

        let err = Error::Trace { line: 3, reason: "missing field `bytes`".into() };
        assert_eq!(err.to_string(), "trace line 3: missing field `bytes`");
    }
}
