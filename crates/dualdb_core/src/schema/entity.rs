//! Entity schema and its builder.

use super::field::{FieldDescriptor, FieldRole};
use crate::error::{CoreError, CoreResult};
use dualdb_codec::FieldType;
use std::collections::HashSet;

/// How records of an entity are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScheme {
    /// A single identity field.
    Identity {
        /// Index of the identity field.
        field: usize,
    },
    /// A hash field plus a range field.
    Composite {
        /// Index of the hash field.
        hash: usize,
        /// Index of the range field.
        range: usize,
    },
}

/// Descriptor table for one model type.
///
/// Built with [`EntitySchema::builder`]:
///
/// ```rust
/// use dualdb_codec::FieldType;
/// use dualdb_core::EntitySchema;
///
/// let schema = EntitySchema::builder("person")
///     .identity("name", FieldType::String)
///     .field("age", FieldType::Int)
///     .build()
///     .unwrap();
/// assert_eq!(schema.id_field().name(), "name");
/// assert!(!schema.is_composite());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    table: String,
    fields: Vec<FieldDescriptor>,
    key: KeyScheme,
    version: Option<usize>,
    cache_fields: Vec<String>,
}

impl EntitySchema {
    /// Starts building a schema for the named entity.
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(name)
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table (or domain) name, before any configured prefix.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Looks up a field by name, failing for unknown names.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the field does not exist.
    pub fn require_field(&self, name: &str) -> CoreResult<&FieldDescriptor> {
        self.field(name).ok_or_else(|| {
            CoreError::validation(format!("{} has no field named {name}", self.name))
        })
    }

    /// Looks up a field by its storage attribute name.
    pub fn field_by_attribute(&self, attribute: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.attribute() == attribute)
    }

    /// Key scheme.
    pub fn key_scheme(&self) -> &KeyScheme {
        &self.key
    }

    /// Returns true for hash + range keyed schemas.
    pub fn is_composite(&self) -> bool {
        matches!(self.key, KeyScheme::Composite { .. })
    }

    /// The identity field, or the hash field of a composite key.
    pub fn id_field(&self) -> &FieldDescriptor {
        match self.key {
            KeyScheme::Identity { field } => &self.fields[field],
            KeyScheme::Composite { hash, .. } => &self.fields[hash],
        }
    }

    /// The range field of a composite key.
    pub fn range_field(&self) -> Option<&FieldDescriptor> {
        match self.key {
            KeyScheme::Identity { .. } => None,
            KeyScheme::Composite { range, .. } => Some(&self.fields[range]),
        }
    }

    /// The optimistic locking version field.
    pub fn version_field(&self) -> Option<&FieldDescriptor> {
        self.version.map(|i| &self.fields[i])
    }

    /// Fields the object cache looks records up by. Opaque to DualDB.
    pub fn cache_fields(&self) -> &[String] {
        &self.cache_fields
    }
}

/// Builder for [`EntitySchema`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    name: String,
    table: Option<String>,
    fields: Vec<FieldDescriptor>,
    cache_fields: Vec<String>,
}

impl EntitySchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
            cache_fields: Vec::new(),
        }
    }

    /// Sets the table name. Defaults to the entity name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a prepared field descriptor.
    #[must_use]
    pub fn descriptor(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a data field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type))
    }

    /// Adds a data field stored under another attribute name.
    #[must_use]
    pub fn field_as(
        self,
        name: impl Into<String>,
        attribute: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type).with_attribute(attribute))
    }

    /// Adds the identity key field.
    #[must_use]
    pub fn identity(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type).with_role(FieldRole::Identity))
    }

    /// Adds the hash key field of a composite key.
    #[must_use]
    pub fn hash_key(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type).with_role(FieldRole::Hash))
    }

    /// Adds the range key field of a composite key.
    #[must_use]
    pub fn range_key(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type).with_role(FieldRole::Range))
    }

    /// Adds the version field used for optimistic locking.
    #[must_use]
    pub fn version(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(name, field_type).with_role(FieldRole::Version))
    }

    /// Marks a field as a cache lookup key.
    #[must_use]
    pub fn cache_by(mut self, name: impl Into<String>) -> Self {
        self.cache_fields.push(name.into());
        self
    }

    /// Validates and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if field or attribute names repeat,
    /// the key designation is missing, mixed or doubled, a key field has an
    /// unsupported type, the version field is not an integer, or a cache
    /// field does not exist.
    pub fn build(self) -> CoreResult<EntitySchema> {
        let err = |message: String| CoreError::schema(&self.name, message);

        let mut names = HashSet::new();
        let mut attributes = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name()) {
                return Err(err(format!("duplicate field {}", field.name())));
            }
            if !attributes.insert(field.attribute()) {
                return Err(err(format!("duplicate attribute {}", field.attribute())));
            }
        }

        let with_role = |role: FieldRole| -> Vec<usize> {
            self.fields
                .iter()
                .enumerate()
                .filter(|(_, f)| f.role() == role)
                .map(|(i, _)| i)
                .collect()
        };
        let identity = with_role(FieldRole::Identity);
        let hash = with_role(FieldRole::Hash);
        let range = with_role(FieldRole::Range);
        let version = with_role(FieldRole::Version);

        let key = match (identity.as_slice(), hash.as_slice(), range.as_slice()) {
            ([field], [], []) => KeyScheme::Identity { field: *field },
            ([], [hash], [range]) => KeyScheme::Composite {
                hash: *hash,
                range: *range,
            },
            ([], [], []) => return Err(err("no key field".to_string())),
            ([_, ..], [_, ..], _) | ([_, ..], _, [_, ..]) => {
                return Err(err(
                    "identity key and composite key are mutually exclusive".to_string(),
                ))
            }
            ([], [_], []) => return Err(err("hash key without range key".to_string())),
            ([], [], [_]) => return Err(err("range key without hash key".to_string())),
            _ => return Err(err("more than one key field per role".to_string())),
        };

        for field in self.fields.iter().filter(|f| f.is_key()) {
            if !matches!(
                field.field_type(),
                FieldType::String
                    | FieldType::Byte
                    | FieldType::Short
                    | FieldType::Int
                    | FieldType::Long
            ) {
                return Err(err(format!(
                    "key field {} has unsupported type {}",
                    field.name(),
                    field.field_type()
                )));
            }
        }

        let version = match version.as_slice() {
            [] => None,
            [i] => {
                let field = &self.fields[*i];
                if !matches!(field.field_type(), FieldType::Int | FieldType::Long) {
                    return Err(err(format!(
                        "version field {} must be int or long",
                        field.name()
                    )));
                }
                Some(*i)
            }
            _ => return Err(err("more than one version field".to_string())),
        };

        if let Some(missing) = self
            .cache_fields
            .iter()
            .find(|c| !self.fields.iter().any(|f| f.name() == c.as_str()))
        {
            return Err(err(format!("cache field {missing} does not exist")));
        }

        Ok(EntitySchema {
            table: self.table.clone().unwrap_or_else(|| self.name.clone()),
            name: self.name.clone(),
            fields: self.fields.clone(),
            key,
            version,
            cache_fields: self.cache_fields.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualdb_codec::ScalarType;

    #[test]
    fn builds_identity_schema() {
        let schema = EntitySchema::builder("person")
            .table("people")
            .identity("name", FieldType::String)
            .field_as("age", "a", FieldType::Int)
            .version("version", FieldType::Long)
            .cache_by("name")
            .build()
            .unwrap();

        assert_eq!(schema.table(), "people");
        assert_eq!(schema.id_field().name(), "name");
        assert!(schema.range_field().is_none());
        assert_eq!(schema.field_by_attribute("a").unwrap().name(), "age");
        assert_eq!(schema.version_field().unwrap().name(), "version");
        assert_eq!(schema.cache_fields(), ["name".to_string()]);
    }

    #[test]
    fn builds_composite_schema() {
        let schema = EntitySchema::builder("item")
            .hash_key("id", FieldType::Long)
            .range_key("name", FieldType::String)
            .field("tags", FieldType::Set(ScalarType::String))
            .build()
            .unwrap();

        assert!(schema.is_composite());
        assert_eq!(schema.table(), "item");
        assert_eq!(schema.id_field().name(), "id");
        assert_eq!(schema.range_field().unwrap().name(), "name");
    }

    #[test]
    fn rejects_bad_key_designations() {
        let cases = [
            EntitySchema::builder("x").field("a", FieldType::String),
            EntitySchema::builder("x")
                .identity("a", FieldType::String)
                .hash_key("b", FieldType::String)
                .range_key("c", FieldType::String),
            EntitySchema::builder("x").hash_key("a", FieldType::String),
            EntitySchema::builder("x").range_key("a", FieldType::String),
            EntitySchema::builder("x")
                .identity("a", FieldType::String)
                .identity("b", FieldType::String),
            EntitySchema::builder("x").identity("a", FieldType::Double),
            EntitySchema::builder("x").identity("a", FieldType::Json),
        ];
        for builder in cases {
            assert!(matches!(builder.build(), Err(CoreError::Schema { .. })));
        }
    }

    #[test]
    fn rejects_duplicates_and_bad_version() {
        let dup_field = EntitySchema::builder("x")
            .identity("a", FieldType::String)
            .field("a", FieldType::Int);
        assert!(dup_field.build().is_err());

        let dup_attr = EntitySchema::builder("x")
            .identity("a", FieldType::String)
            .field_as("b", "a", FieldType::Int);
        assert!(dup_attr.build().is_err());

        let bad_version = EntitySchema::builder("x")
            .identity("a", FieldType::String)
            .version("v", FieldType::String);
        assert!(bad_version.build().is_err());

        let bad_cache = EntitySchema::builder("x")
            .identity("a", FieldType::String)
            .cache_by("nope");
        assert!(bad_cache.build().is_err());
    }

    #[test]
    fn unknown_field_is_a_validation_error() {
        let schema = EntitySchema::builder("x")
            .identity("a", FieldType::String)
            .build()
            .unwrap();
        assert!(matches!(
            schema.require_field("b"),
            Err(CoreError::Validation { .. })
        ));
    }
}
