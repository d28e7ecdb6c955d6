//! Error types for dbsync-core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using dbsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in dbsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database file does not exist
    #[error("Database file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Table or column name rejected by the safe-identifier check
    #[error("Invalid table name: {0:?}")]
    InvalidIdentifier(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A conflict policy refused to resolve a row
    #[error("Conflict resolution failed for table {table}: {message}")]
    Resolver {
        /// Table whose row could not be resolved
        table: String,
        /// Resolver-provided reason
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a resolver failure for `table`.
    pub fn resolver(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolver {
            table: table.into(),
            message: message.into(),
        }
    }
}
