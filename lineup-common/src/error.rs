//! Common error types for the lineup services

use thiserror::Error;

/// Common result type for lineup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the lineup crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot serialization or schema error
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A merge request with the same ordered change list is already pending
    #[error("Similar merge request already pending")]
    DuplicateMergeRequest,

    /// Draft and canonical timetable render identically for every room
    #[error("No change with current lineup")]
    NothingToMerge,
}
