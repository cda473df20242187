//! Storage keys.
//!
//! A single-identity entity is stored under the encoded identity value. A
//! composite entity is stored under
//!
//! ```text
//! <byte length of encoded hash> ":" <encoded hash> "/" <encoded range>
//! ```
//!
//! The length prefix makes the key parseable even when either part
//! contains `:` or `/`.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDescriptor};
use dualdb_codec::{decode, encode, Value};
use std::fmt;

/// The locator of one record in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wraps a key string read back from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn encode_key_part(
    schema: &EntitySchema,
    field: &FieldDescriptor,
    value: &Value,
) -> CoreResult<String> {
    encode(value, field.field_type())?.ok_or_else(|| {
        CoreError::validation(format!(
            "{} key field {} is null",
            schema.name(),
            field.name()
        ))
    })
}

/// Builds the storage key from key values.
///
/// # Errors
///
/// Returns [`CoreError::MissingRangeKey`] if the schema is composite and no
/// range value is given, a validation error for a null identity or for a
/// range value on a single-identity schema, and a codec error if a value
/// does not fit its field type.
pub fn build_key(
    schema: &EntitySchema,
    id: &Value,
    range: Option<&Value>,
) -> CoreResult<StorageKey> {
    let id_text = encode_key_part(schema, schema.id_field(), id)?;

    match (schema.range_field(), range) {
        (None, None) => Ok(StorageKey(id_text)),
        (None, Some(_)) => Err(CoreError::validation(format!(
            "{} has no range key",
            schema.name()
        ))),
        (Some(_), None) | (Some(_), Some(Value::Null)) => Err(CoreError::MissingRangeKey {
            entity: schema.name().to_string(),
        }),
        (Some(field), Some(range)) => {
            let range_text = encode_key_part(schema, field, range)?;
            Ok(StorageKey(format!("{}:{id_text}/{range_text}", id_text.len())))
        }
    }
}

/// Builds the storage key of a record from its key fields.
///
/// # Errors
///
/// See [`build_key`].
pub fn key_of(schema: &EntitySchema, record: &Record) -> CoreResult<StorageKey> {
    build_key(schema, record.id(schema), record.range(schema))
}

/// Splits a storage key back into its key values.
///
/// # Errors
///
/// Returns [`CoreError::MalformedKey`] if a composite key has a
/// non-numeric length prefix, a prefix that runs past the end of the key,
/// or no `/` after the hash part, and a codec error if a part does not
/// decode to its field type.
pub fn parse_key(
    schema: &EntitySchema,
    key: &StorageKey,
) -> CoreResult<(Value, Option<Value>)> {
    let text = key.as_str();
    let id_field = schema.id_field();

    let Some(range_field) = schema.range_field() else {
        return Ok((decode(Some(text), id_field.field_type())?, None));
    };

    let (len, rest) = text
        .split_once(':')
        .ok_or_else(|| CoreError::malformed_key(text, "missing length prefix"))?;
    let len: usize = len
        .parse()
        .map_err(|_| CoreError::malformed_key(text, "length prefix is not a number"))?;
    let id_text = rest
        .get(..len)
        .ok_or_else(|| CoreError::malformed_key(text, "length prefix runs past the key"))?;
    let range_text = rest[len..]
        .strip_prefix('/')
        .ok_or_else(|| CoreError::malformed_key(text, "missing '/' after hash key"))?;

    Ok((
        decode(Some(id_text), id_field.field_type())?,
        Some(decode(Some(range_text), range_field.field_type())?),
    ))
}
