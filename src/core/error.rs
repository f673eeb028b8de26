//! Error types for the query executor
//!
//! This module defines all error types that can occur while assembling,
//! translating and executing queries.

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for query assembly and execution
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Invalid connection string
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Invalid executor configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A value could not be normalized into a database value
    #[error("Cannot convert {type_name} to a database value: {message}")]
    ConversionFailed { type_name: String, message: String },

    /// Connection could not be opened
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// A query template could not be decoded
    #[error("Malformed query template at byte {position}: {message}")]
    MalformedQuery { position: usize, message: String },

    /// Operation needs a non-empty query text
    #[error("Query text is empty")]
    EmptyQuery,

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create an invalid connection string error
    pub fn invalid_connection_string<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidConnectionString(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidConfiguration(msg.into())
    }

    /// Create a conversion error for the named source type
    pub fn conversion(type_name: &str, message: impl Into<String>) -> Self {
        DatabaseError::ConversionFailed {
            type_name: type_name.to_string(),
            message: message.into(),
        }
    }

    /// Create a connection failed error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionFailed {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection failed error keeping the driver error as source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        DatabaseError::ConnectionFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a malformed template error
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        DatabaseError::MalformedQuery {
            position,
            message: message.into(),
        }
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        DatabaseError::UnsupportedOperation(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// True when a configured command timeout elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, DatabaseError::QueryTimeout { .. })
    }

    /// True when the caller's cancellation signal aborted the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DatabaseError::Cancelled)
    }

    /// True for errors raised while constructing an executor
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::InvalidConnectionString(_) | DatabaseError::InvalidConfiguration(_)
        )
    }
}
