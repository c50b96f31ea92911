//! Error types for docstore operations

use mongodb::bson;
use thiserror::Error;

/// Main error type for docstore operations
#[derive(Debug, Error)]
pub enum DocStoreError {
    /// The configured database type tag is not one this facade can connect to
    #[error("Invalid database type: {0}")]
    InvalidDatabaseType(String),

    /// The requested storage driver is not implemented
    #[error("Unsupported storage driver: {0}")]
    InvalidDriver(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dialing or verifying the connection failed
    #[error("Connection error: {0}")]
    Connection(#[source] mongodb::error::Error),

    /// Driver error raised while executing an operation
    #[error("Database error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// Identifier is not a 24 character hex object id
    #[error("Invalid object id: {0}")]
    InvalidObjectId(#[from] bson::oid::Error),

    /// Value could not be encoded as a document
    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    /// Document could not be decoded into the requested type
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    /// Nothing matched the operation
    #[error("Not found: {0}")]
    NotFound(String),

    /// The connection has been closed
    #[error("Connection is closed")]
    Closed,
}

/// Convenient Result type using DocStoreError
pub type Result<T> = std::result::Result<T, DocStoreError>;

impl DocStoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        DocStoreError::Config(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        DocStoreError::NotFound(msg.into())
    }

    /// Create an invalid database type error
    pub fn invalid_database_type(tag: impl Into<String>) -> Self {
        DocStoreError::InvalidDatabaseType(tag.into())
    }

    /// Create an invalid driver error
    pub fn invalid_driver(tag: impl Into<String>) -> Self {
        DocStoreError::InvalidDriver(tag.into())
    }

    /// Whether this is the soft "nothing matched" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocStoreError::NotFound(_))
    }
}

/// Treat "not found" as an empty, successful outcome.
///
/// Absence of a match is expected for update, upsert, find and remove paths,
/// so `Err(NotFound)` becomes `Ok(T::default())`. Every other error passes
/// through unchanged.
pub fn normalize_not_found<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(e) if e.is_not_found() => Ok(T::default()),
        other => other,
    }
}
