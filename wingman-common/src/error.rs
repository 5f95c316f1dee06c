//! Common error types for Wingman

use thiserror::Error;

/// Common result type for Wingman operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Wingman crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Version descriptor list is not a contiguous ascending chain starting at 1.
    ///
    /// This is a programming error; the store refuses to open.
    #[error("Invalid schema chain: {0}")]
    SchemaChain(String),

    /// An upgrade transform failed; its version was not recorded
    #[error("Migration v{version} failed: {message}")]
    Migration {
        /// Version whose transform failed
        version: u32,
        /// Underlying failure
        message: String,
    },

    /// Compatibility model migration invoked on an ineligible source
    #[error("Migration precondition not met: {0}")]
    MigrationPrecondition(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
