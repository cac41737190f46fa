//! Error types for chainport

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// A store file expected by the pre-flight check is absent.
    #[error("no {store} found in {}", .dir.display())]
    StoreMissing { store: &'static str, dir: PathBuf },

    #[error("Failed to open store: {0}")]
    StoreOpen(String),

    #[error("{record} not found at height {height}")]
    NotFound { record: &'static str, height: i64 },

    #[error("{0} store holds no record")]
    EmptyStore(&'static str),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown database backend: {0}")]
    UnknownBackend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Whether this error came out of a target write.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, MigrationError::Write(_))
    }
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        MigrationError::Database(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for MigrationError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        MigrationError::Codec(err.to_string())
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        MigrationError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, MigrationError>;
