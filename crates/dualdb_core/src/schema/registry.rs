//! Schema registry.

use super::entity::EntitySchema;
use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registered schemas by entity name.
///
/// Read-mostly: registration happens at start-up, lookups happen on every
/// operation and may run concurrently.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<EntitySchema>>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its entity name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Schema`] if the name is already taken.
    pub fn register(&self, schema: EntitySchema) -> CoreResult<Arc<EntitySchema>> {
        let mut schemas = self.schemas.write();
        if schemas.contains_key(schema.name()) {
            return Err(CoreError::schema(schema.name(), "already registered"));
        }
        let schema = Arc::new(schema);
        schemas.insert(schema.name().to_string(), Arc::clone(&schema));
        tracing::debug!(entity = schema.name(), table = schema.table(), "registered schema");
        Ok(schema)
    }

    /// Looks up a schema.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntity`] if nothing is registered under
    /// `name`.
    pub fn get(&self, name: &str) -> CoreResult<Arc<EntitySchema>> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Returns true if a schema is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// Registered entity names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }
}
