//! Error types for sn2n.
//!
//! Library crates use [`Sn2nError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Content-level imperfections (malformed HTML, unresolved images, failed
//! audits) are never errors; they are reported as data. Only contract
//! violations and collaborator failures end up here.

use std::path::PathBuf;

/// Top-level error type for all sn2n operations.
#[derive(Debug, thiserror::Error)]
pub enum Sn2nError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (caller-supplied input violates a contract).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON/TOML (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persistence collaborator error (create/append rejected).
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Conversion worker failure (task panicked or was cancelled).
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, Sn2nError>;

impl Sn2nError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Sn2nError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = Sn2nError::config("max_depth must be at least 2");
        assert_eq!(err.to_string(), "config error: max_depth must be at least 2");

        let err = Sn2nError::validation("empty page title");
        assert!(err.to_string().contains("empty page title"));

        let err = Sn2nError::Persistence("append rejected".into());
        assert_eq!(err.to_string(), "persistence error: append rejected");
    }

    #[test]
    fn json_error_converts_to_serialization() {
        let err: Sn2nError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, Sn2nError::Serialization(_)));
    }
}
