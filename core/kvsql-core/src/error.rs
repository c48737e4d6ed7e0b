//! Error types for the kvsql execution layer.
//!
//! All public APIs return `KvsqlResult<T>`; library code does not panic.

use thiserror::Error;

/// Unified error type for all kvsql operations.
#[derive(Debug, Error)]
pub enum KvsqlError {
    /// A scalar getter could not coerce the stored value to the requested kind
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Unsupported literal kind in a predicate or a primary key
    #[error("invalid predicate value for column '{column}': {value}")]
    InvalidPredicateValue { column: String, value: String },

    /// INSERT without the primary-key pseudo-column
    #[error("primary key column '{column}' is not specified")]
    MissingPrimaryKey { column: String },

    /// INSERT pre-check found keys that already exist
    #[error("duplicate entries: {keys}")]
    DuplicateKey { keys: String },

    /// Scroll/update method unsupported by the forward-only cursor
    #[error("operation not supported: {0}")]
    UnsupportedOperation(String),

    /// Operation on a closed cursor or statement
    #[error("{0} is closed")]
    ClosedResource(String),

    /// Unknown label in a column lookup
    #[error("column '{0}' does not exist")]
    ColumnNotFound(String),

    /// Operator symbol missing from the registry
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// Storage layer error reported by a client implementation
    #[error("storage error: {0}")]
    Storage(String),

    /// sled embedded database error
    #[error("sled error: {source}")]
    Sled {
        #[from]
        source: sled::Error,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for all kvsql operations.
pub type KvsqlResult<T> = Result<T, KvsqlError>;

impl KvsqlError {
    pub(crate) fn type_mismatch(expected: &str, actual: impl Into<String>) -> Self {
        KvsqlError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    pub(crate) fn invalid_value(column: &str, value: impl std::fmt::Debug) -> Self {
        KvsqlError::InvalidPredicateValue {
            column: column.to_string(),
            value: format!("{value:?}"),
        }
    }
}

impl From<serde_json::Error> for KvsqlError {
    fn from(err: serde_json::Error) -> Self {
        KvsqlError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for KvsqlError {
    fn from(err: bincode::Error) -> Self {
        KvsqlError::Serialization(err.to_string())
    }
}
