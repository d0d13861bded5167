//! Error types for steadymark

use thiserror::Error;

/// Main error type for steadymark operations
#[derive(Error, Debug)]
pub enum SteadymarkError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The downstream document renderer failed
    #[error("Render error: {0}")]
    Render(String),

    /// A backtrack request exceeded the allowed distance
    #[error("Backtrack of {requested} exceeds limit of {limit}")]
    BacktrackOutOfRange {
        /// Number of characters requested
        requested: usize,
        /// Largest distance that would have been honoured
        limit: usize,
    },

    /// Internal parser state was inconsistent and had to be reset
    #[error("State corruption: {0}")]
    StateCorruption(String),
}

/// Result type alias for steadymark operations
pub type Result<T> = std::result::Result<T, SteadymarkError>;
