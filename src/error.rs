//! Error types for autoconvert.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration loading and transcoder handling.
///
/// The scheduler never returns these to its caller; they end up as log
/// records and notifications instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No configuration document exists at the expected location.
    #[error("config not found at {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// The configuration document exists but could not be decoded or is invalid.
    #[error("failed to parse config {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// The transcoder process could not be started.
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config parse error.
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error.
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }
}
