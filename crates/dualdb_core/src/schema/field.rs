//! Field descriptors.

use dualdb_codec::FieldType;

/// The part a field plays in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// Ordinary data field.
    Data,
    /// Single identity key.
    Identity,
    /// Hash part of a composite key.
    Hash,
    /// Range part of a composite key.
    Range,
    /// Optimistic locking version counter.
    Version,
}

impl FieldRole {
    /// Returns true for the identity, hash and range roles.
    pub const fn is_key(self) -> bool {
        matches!(self, Self::Identity | Self::Hash | Self::Range)
    }
}

/// One field of an entity schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    attribute: String,
    field_type: FieldType,
    role: FieldRole,
}

impl FieldDescriptor {
    /// Creates a data field stored under its own name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            attribute: name.clone(),
            name,
            field_type,
            role: FieldRole::Data,
        }
    }

    /// Stores the field under a different attribute name.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Assigns a role.
    #[must_use]
    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }

    /// Field name used by application code.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute name used in storage.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Logical type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Role in the schema.
    pub fn role(&self) -> FieldRole {
        self.role
    }

    /// Returns true if the field is part of the key.
    pub fn is_key(&self) -> bool {
        self.role.is_key()
    }
}
