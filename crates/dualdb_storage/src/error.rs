//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors returned by a storage service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The table (or domain) does not exist.
    #[error("no such table: {0}")]
    NoSuchTable(String),

    /// A conditional write found a different value than expected.
    #[error("conditional check failed on {table}/{key}: {message}")]
    ConditionalCheckFailed {
        /// The table written to.
        table: String,
        /// Textual form of the item key.
        key: String,
        /// Which expectation did not hold.
        message: String,
    },

    /// A batch call carried more items than the service accepts.
    #[error("batch too large: {actual} items, limit {limit}")]
    BatchTooLarge {
        /// Maximum number of items per call.
        limit: usize,
        /// Number of items sent.
        actual: usize,
    },

    /// A select expression could not be parsed.
    #[error("invalid query expression {expression:?}: {message}")]
    InvalidExpression {
        /// The expression as sent.
        expression: String,
        /// Parser message.
        message: String,
    },

    /// A continuation token was not issued by this service.
    #[error("invalid continuation token: {0}")]
    InvalidNextToken(String),

    /// The request is structurally invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other failure reported by the remote service.
    #[error("service error {code}: {message}")]
    Service {
        /// Service error code.
        code: String,
        /// Service error message.
        message: String,
    },
}

impl StorageError {
    /// Creates a conditional check failure.
    pub fn conditional_check_failed(
        table: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConditionalCheckFailed {
            table: table.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid expression error.
    pub fn invalid_expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns true if the failure is a failed conditional write.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed { .. })
    }
}
