//! Error types for rbpeek

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for rbpeek operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A symbolic style name with no recognized component
    #[error("Invalid style name: {0:?}")]
    InvalidStyleName(String),

    /// Text that is not a `ESC [ ... m` sequence
    #[error("Malformed escape sequence: {0:?}")]
    MalformedEscapeSequence(String),

    #[error("Source unavailable: {}: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("No definition found at or after line {line}")]
    DefinitionNotFound { line: usize },

    #[error("Definition starting at line {line} is never closed")]
    UnterminatedConstruct { line: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad command line
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Build a `SourceUnavailable` error for a path
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
