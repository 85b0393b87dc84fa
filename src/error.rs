//! Error types for volume package operations

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for volume package operations
#[derive(Error, Debug)]
pub enum VolpkgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No files found: {0}")]
    EmptyHierarchy(String),

    #[error("Irregular hierarchy at level {level}: {detail}")]
    IrregularHierarchy { level: usize, detail: String },

    #[error("Unreadable file {}: {reason}", .path.display())]
    UnreadableFile { path: PathBuf, reason: String },

    #[error("Malformed header in {}: {reason}", .path.display())]
    MalformedHeader { path: PathBuf, reason: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invalid data type: expected {expected}, found {found}")]
    InvalidDataType { expected: String, found: String },

    #[error("Chunk {coords:?} does not match the array layout: {detail}")]
    ChunkMismatch { coords: Vec<usize>, detail: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Specialized Result type for volume package operations
pub type Result<T> = std::result::Result<T, VolpkgError>;

impl VolpkgError {
    /// Build an `UnreadableFile` error for `path`
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        VolpkgError::UnreadableFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `MalformedHeader` error for `path`
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VolpkgError::MalformedHeader {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for VolpkgError {
    fn from(err: serde_json::Error) -> Self {
        VolpkgError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for VolpkgError {
    fn from(err: tokio::task::JoinError) -> Self {
        VolpkgError::Task(err.to_string())
    }
}
