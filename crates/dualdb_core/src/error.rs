//! Error types for DualDB core.

use dualdb_codec::CodecError;
use dualdb_storage::StorageError;
use thiserror::Error;

/// Service error code for responses that cannot be read back.
pub const INVALID_RESPONSE: &str = "InvalidResponse";

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad classes of failure, for callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad schema registration.
    Schema,
    /// Bad query or record construction.
    Validation,
    /// A storage key could not be parsed.
    MalformedKey,
    /// A version-checked write lost a race.
    OptimisticLockConflict,
    /// The storage service failed.
    Backend,
    /// The backend cannot do what was asked.
    UnsupportedOperation,
}

/// Errors that can occur in DualDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Schema registration failed.
    #[error("schema error in {entity}: {message}")]
    Schema {
        /// The entity being registered.
        entity: String,
        /// What is wrong with it.
        message: String,
    },

    /// No schema is registered under this name.
    #[error("unknown entity: {name}")]
    UnknownEntity {
        /// The requested entity name.
        name: String,
    },

    /// A query, condition or record is invalid.
    #[error("validation error: {message}")]
    Validation {
        /// What is invalid.
        message: String,
    },

    /// A caller-supplied value could not be encoded or coerced. Stored
    /// values that fail to decode are reported as
    /// [`CoreError::Backend`] instead.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A composite schema was addressed without its range key.
    #[error("entity {entity} requires a range key")]
    MissingRangeKey {
        /// The entity addressed.
        entity: String,
    },

    /// The requested sort is not possible on this backend.
    #[error("cannot order {entity} by {field}: {message}")]
    UnsupportedOrderBy {
        /// The entity queried.
        entity: String,
        /// The sort field.
        field: String,
        /// Why the sort is rejected.
        message: String,
    },

    /// A storage key could not be parsed.
    #[error("malformed key {key:?}: {message}")]
    MalformedKey {
        /// The key as stored.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// A sort was requested on a query that can only run as a scan.
    #[error("ordering {entity} by {field} requires a key query, but the filters force a scan")]
    OrderByRequiresQuery {
        /// The entity queried.
        entity: String,
        /// The sort field.
        field: String,
    },

    /// A conditional write found a different version than expected.
    #[error("optimistic lock conflict on {entity} {key}: {message}")]
    OptimisticLockConflict {
        /// The entity written.
        entity: String,
        /// Storage key of the record.
        key: String,
        /// Service detail.
        message: String,
    },

    /// The storage service returned an error.
    #[error("backend error during {context}: {source}")]
    Backend {
        /// The request that failed.
        context: String,
        /// The service error.
        #[source]
        source: StorageError,
    },

    /// The operation is not available on the selected backend.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation {
        /// What was attempted.
        message: String,
    },
}

impl CoreError {
    /// Creates a schema error.
    pub fn schema(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a malformed key error.
    pub fn malformed_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Wraps a service error with the request it belongs to.
    pub fn backend(context: impl Into<String>, source: StorageError) -> Self {
        Self::Backend {
            context: context.into(),
            source,
        }
    }

    /// A service response that cannot be read back, such as a stored value
    /// that does not decode as its field type.
    pub fn invalid_response(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::backend(
            context,
            StorageError::Service {
                code: INVALID_RESPONSE.to_string(),
                message: message.into(),
            },
        )
    }

    /// Wraps a service error from a conditional write.
    ///
    /// A failed precondition becomes [`CoreError::OptimisticLockConflict`];
    /// anything else is a [`CoreError::Backend`] error.
    pub fn write(
        entity: &str,
        key: impl Into<String>,
        context: impl Into<String>,
        source: StorageError,
    ) -> Self {
        match source {
            StorageError::ConditionalCheckFailed { message, .. } => Self::OptimisticLockConflict {
                entity: entity.to_string(),
                key: key.into(),
                message,
            },
            other => Self::backend(context, other),
        }
    }

    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Schema { .. } | Self::UnknownEntity { .. } => ErrorCategory::Schema,
            Self::Validation { .. }
            | Self::Codec(_)
            | Self::MissingRangeKey { .. }
            | Self::UnsupportedOrderBy { .. } => ErrorCategory::Validation,
            Self::MalformedKey { .. } => ErrorCategory::MalformedKey,
            Self::OptimisticLockConflict { .. } => ErrorCategory::OptimisticLockConflict,
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::UnsupportedOperation { .. } | Self::OrderByRequiresQuery { .. } => {
                ErrorCategory::UnsupportedOperation
            }
        }
    }

    /// Returns true if the same call may succeed when repeated.
    ///
    /// Caller-input errors are detected before any request is sent and
    /// will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::OptimisticLockConflict | ErrorCategory::Backend
        )
    }
}
