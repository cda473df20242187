//! Optimistic locking through a version field.

use crate::backend::Expectation;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDescriptor};
use dualdb_codec::Value;

/// Turns puts of a versioned entity into conditional puts.
///
/// The write must only succeed if the stored version is still the one the
/// caller read; the record then goes out carrying the next version.
#[derive(Debug, Clone, Copy)]
pub struct VersionGuard<'a> {
    field: &'a FieldDescriptor,
}

impl<'a> VersionGuard<'a> {
    /// Returns a guard if the schema declares a version field.
    pub fn for_schema(schema: &'a EntitySchema) -> Option<Self> {
        schema.version_field().map(|field| Self { field })
    }

    /// The version field.
    pub fn field(&self) -> &FieldDescriptor {
        self.field
    }

    /// Captures the current version as the write condition, then increments
    /// the record's version by one.
    ///
    /// An absent or zero version expects no stored version at all.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the version is not an integer or is
    /// already at the maximum of its type.
    pub fn advance(&self, record: &mut Record) -> CoreResult<Expectation> {
        let name = self.field.name();
        let current = record.value(name).clone();
        let version = match &current {
            Value::Null => 0,
            value => value.as_i64().ok_or_else(|| {
                CoreError::validation(format!("version field {name} holds a {}", value.kind()))
            })?,
        };

        let expected = if version == 0 {
            Expectation::absent(name)
        } else {
            Expectation::equals(name, current)
        };

        let next = version
            .checked_add(1)
            .and_then(|n| Value::Long(n).coerce(self.field.field_type()).ok())
            .ok_or_else(|| {
                CoreError::validation(format!("version field {name} cannot pass {version}"))
            })?;
        record.set(name, next);
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualdb_codec::FieldType;

    fn schema() -> EntitySchema {
        EntitySchema::builder("doc")
            .identity("id", FieldType::String)
            .field("body", FieldType::String)
            .version("version", FieldType::Int)
            .build()
            .unwrap()
    }

    #[test]
    fn unversioned_schema_has_no_guard() {
        let schema = EntitySchema::builder("plain")
            .identity("id", FieldType::String)
            .build()
            .unwrap();
        assert!(VersionGuard::for_schema(&schema).is_none());
    }

    #[test]
    fn first_write_expects_absence() {
        let schema = schema();
        let guard = VersionGuard::for_schema(&schema).unwrap();
        assert_eq!(guard.field().name(), "version");

        let mut record = Record::new().with("id", "a");
        let expected = guard.advance(&mut record).unwrap();
        assert_eq!(expected, Expectation::absent("version"));
        assert_eq!(record.value("version"), &Value::Int(1));
    }

    #[test]
    fn later_writes_expect_the_old_version() {
        let schema = schema();
        let guard = VersionGuard::for_schema(&schema).unwrap();

        let mut record = Record::new().with("id", "a").with("version", 3);
        let expected = guard.advance(&mut record).unwrap();
        assert_eq!(expected, Expectation::equals("version", 3));
        assert_eq!(record.value("version"), &Value::Int(4));
    }

    #[test]
    fn overflow_is_rejected() {
        let schema = schema();
        let guard = VersionGuard::for_schema(&schema).unwrap();

        let mut record = Record::new().with("id", "a").with("version", i32::MAX);
        assert!(matches!(
            guard.advance(&mut record),
            Err(CoreError::Validation { .. })
        ));
        assert_eq!(record.value("version"), &Value::Int(i32::MAX));
    }
}
