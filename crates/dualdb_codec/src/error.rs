//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value does not fit the declared field type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The declared field type.
        expected: String,
        /// The kind of value that was supplied.
        found: String,
    },

    /// An integer literal does not fit the target width.
    #[error("value {value} is out of range for {target}")]
    OutOfRange {
        /// Textual form of the offending value.
        value: String,
        /// The target field type.
        target: String,
    },

    /// Stored text could not be parsed back into the declared type.
    #[error("cannot decode {text:?} as {field_type}: {message}")]
    InvalidText {
        /// The declared field type.
        field_type: String,
        /// The stored text.
        text: String,
        /// Parser message.
        message: String,
    },

    /// Structured (JSON) serialization failed.
    #[error("structured encoding failed: {message}")]
    Structured {
        /// Description of the serde failure.
        message: String,
    },

    /// The value has no native number representation.
    #[error("{kind} has no numeric representation")]
    NotNumeric {
        /// The kind of value that was supplied.
        kind: String,
    },
}

impl CodecError {
    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl ToString, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.into(),
        }
    }

    /// Create an out of range error.
    pub fn out_of_range(value: impl ToString, target: impl ToString) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target: target.to_string(),
        }
    }

    /// Create an invalid text error.
    pub fn invalid_text(
        field_type: impl ToString,
        text: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::InvalidText {
            field_type: field_type.to_string(),
            text: text.into(),
            message: message.to_string(),
        }
    }

    /// Create a structured encoding error.
    pub fn structured(message: impl ToString) -> Self {
        Self::Structured {
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::structured(err)
    }
}
