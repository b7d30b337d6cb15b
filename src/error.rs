//! Error types for cadastro
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.

use std::io;

/// Main error type for the cadastro application
#[derive(Debug, thiserror::Error)]
pub enum CadastroError {
    /// Database plumbing errors (pool, driver, catalog)
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Record operation errors
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Boundary request errors
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection or build the pool
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No connection became available within the pool's wait timeout
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Statement execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Schema introspection failed
    #[error("Schema loading failed: {0}")]
    SchemaLoadFailed(String),

    /// BEGIN/COMMIT/ROLLBACK failed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Type conversion error
    #[error("Type conversion error: {0}")]
    TypeConversion(String),
}

/// Errors raised by the five record operation families.
///
/// Every variant except `Validation` and `Coercion` wraps a failure that
/// happened during I/O and carries the underlying driver message.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Missing or empty required field, detected before any I/O
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Read statement failed
    #[error("Error executing query: {0}")]
    Query(String),

    /// INSERT failed
    #[error("Error inserting records: {0}")]
    Insert(String),

    /// UPDATE failed
    #[error("Error updating records: {0}")]
    Update(String),

    /// DELETE failed
    #[error("Error deleting records: {0}")]
    Delete(String),

    /// Transactional move failed and was rolled back
    #[error("Error moving records: {0}")]
    Relocate(String),

    /// A row identifier could not be parsed as an integer
    #[error("Invalid row identifier: {0}")]
    Coercion(String),
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found or unreadable
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Connection profile not found
    #[error("Connection profile '{0}' not found")]
    ProfileNotFound(String),
}

/// Boundary request parsing errors
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Unknown operation name
    #[error("Unknown operation: {0}")]
    Unknown(String),

    /// Payload did not match the operation's shape
    #[error("Malformed payload for {operation}: {message}")]
    MalformedPayload { operation: String, message: String },

    /// Request line was not a valid envelope
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Operation cannot be served in this mode
    #[error("Operation {0} is not supported here")]
    Unsupported(String),
}

impl DbError {
    /// The underlying message without the category prefix
    pub fn detail(&self) -> &str {
        match self {
            DbError::ConnectionFailed(m)
            | DbError::PoolExhausted(m)
            | DbError::QueryFailed(m)
            | DbError::SchemaLoadFailed(m)
            | DbError::Transaction(m)
            | DbError::TypeConversion(m) => m,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::NotFound(e.to_string())
    }
}

/// Specialized Result type for cadastro operations
pub type Result<T> = std::result::Result<T, CadastroError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for record operations
pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized Result type for boundary requests
pub type RequestResult<T> = std::result::Result<T, RequestError>;
