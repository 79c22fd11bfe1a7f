//! Error types for Oraculum

use thiserror::Error;

/// Result type alias using Oraculum's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Oraculum operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Batch length mismatch: {left} vs {right}")]
    BatchMismatch { left: usize, right: usize },

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
