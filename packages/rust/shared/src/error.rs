//! Error types for SourceScout.
//!
//! Library crates use [`SourceScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SourceScout operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceScoutError {
    /// Missing or invalid configuration, including query collections.
    /// Fatal: aborts before any stage runs.
    #[error("config error: {message}")]
    Config { message: String },

    /// Search, page-fetch, or language-model call failure.
    /// Recovered per item by every stage.
    #[error("provider error: {0}")]
    Provider(String),

    /// A persisted store holds rows that cannot be decoded.
    #[error("data integrity error in {store} store: {message}")]
    DataIntegrity { store: &'static str, message: String },

    /// Database open/execute failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// HTML or model-output parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifier, invalid value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Another run holds the exclusive lock for this industry.
    #[error("industry '{industry}' is locked by another run (lock file: {path:?})")]
    Locked { industry: String, path: PathBuf },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SourceScoutError>;

impl SourceScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a provider error from any displayable message.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a data integrity error for the named store.
    pub fn integrity(store: &'static str, msg: impl Into<String>) -> Self {
        Self::DataIntegrity {
            store,
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SourceScoutError::config("no query collection for 'fintech'");
        assert_eq!(
            err.to_string(),
            "config error: no query collection for 'fintech'"
        );

        let err = SourceScoutError::integrity("summaries", "invalid created_at");
        assert!(err.to_string().contains("summaries store"));
    }
}
