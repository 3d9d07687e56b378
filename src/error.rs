//! Error types
//!
//! `StorageError` covers the store layer (SQLite and filesystem I/O).
//! `ApiError` is what the public surface returns.

use crate::types::NodeKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Errors returned by the index API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown {kind} metadata column: {column}")]
    UnknownColumn { kind: NodeKind, column: String },

    #[error("Invalid metadata column: {0}")]
    InvalidColumn(String),

    #[error("No index store at {0}")]
    StoreNotFound(PathBuf),

    #[error("An index store already exists at {0}")]
    StoreExists(PathBuf),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::StorageError(StorageError::Sqlite(err))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::StorageError(StorageError::IoError(err))
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
