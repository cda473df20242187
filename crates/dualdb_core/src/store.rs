//! Entity store facade.

use crate::backend::{Backend, BackendTranslator, Expectation};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::key::{build_key, key_of};
use crate::query::Query;
use crate::record::{Model, Record};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::version::VersionGuard;
use dualdb_codec::Value;
use dualdb_storage::{AttributeStoreClient, KeyRangeClient};
use std::sync::Arc;

/// Reads, writes and queries registered entities on one backend.
///
/// # Example
///
/// ```rust
/// use dualdb_codec::{FieldType, Value};
/// use dualdb_core::{Config, EntitySchema, EntityStore, Record, SchemaRegistry};
/// use dualdb_storage::{InMemoryKeyRangeStore, KeySchema};
/// use std::sync::Arc;
///
/// let service = Arc::new(InMemoryKeyRangeStore::new());
/// service.create_table("item", KeySchema::hash_range("id", "name"));
/// let registry = Arc::new(SchemaRegistry::new());
/// let store = EntityStore::key_range(service, registry, Config::default()).unwrap();
/// store
///     .register(
///         EntitySchema::builder("item")
///             .hash_key("id", FieldType::Long)
///             .range_key("name", FieldType::String)
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let mut item = Record::new().with("id", 31i64).with("name", "item31");
/// store.put("item", &mut item).unwrap();
/// let found = store.get_composite("item", 31i64, "item31").unwrap();
/// assert_eq!(found, Some(item));
/// ```
#[derive(Debug)]
pub struct EntityStore {
    backend: Backend,
    registry: Arc<SchemaRegistry>,
}

impl EntityStore {
    /// Creates a store over an existing backend, using the backend's
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configuration is invalid.
    pub fn new(backend: Backend, registry: Arc<SchemaRegistry>) -> CoreResult<Self> {
        backend.config().validate()?;
        Ok(Self { backend, registry })
    }

    /// Creates a store on an attribute store service.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configuration is invalid.
    pub fn attribute_store(
        client: Arc<dyn AttributeStoreClient>,
        registry: Arc<SchemaRegistry>,
        config: Config,
    ) -> CoreResult<Self> {
        Self::new(Backend::attribute_store(client, config), registry)
    }

    /// Creates a store on a key/range store service.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configuration is invalid.
    pub fn key_range(
        client: Arc<dyn KeyRangeClient>,
        registry: Arc<SchemaRegistry>,
        config: Config,
    ) -> CoreResult<Self> {
        Self::new(Backend::key_range(client, config), registry)
    }

    /// The backend translator.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        self.backend.config()
    }

    /// Registers a schema.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the name is taken.
    pub fn register(&self, schema: EntitySchema) -> CoreResult<Arc<EntitySchema>> {
        self.registry.register(schema)
    }

    /// Registers the schema of a model type.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the schema is invalid or the name is taken.
    pub fn register_model<M: Model>(&self) -> CoreResult<Arc<EntitySchema>> {
        self.register(M::schema()?)
    }

    fn schema(&self, entity: &str) -> CoreResult<Arc<EntitySchema>> {
        self.registry.get(entity)
    }

    /// Writes a record.
    ///
    /// Versioned entities are written conditionally on the version the
    /// record carries. On success `record` is replaced by what was stored:
    /// values coerced to their field types and the version incremented. On
    /// failure it is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OptimisticLockConflict`] if the stored version
    /// changed, and validation, key, codec or backend errors otherwise.
    pub fn put(&self, entity: &str, record: &mut Record) -> CoreResult<()> {
        let schema = self.schema(entity)?;
        let mut stored = record.conform(&schema)?;
        match VersionGuard::for_schema(&schema) {
            Some(guard) => {
                let expected = guard.advance(&mut stored)?;
                tracing::debug!(
                    entity,
                    version = %stored.value(guard.field().name()),
                    "versioned put"
                );
                self.backend.put_if(&schema, &stored, &expected)?;
            }
            None => self.backend.put(&schema, &stored)?,
        }
        *record = stored;
        Ok(())
    }

    /// Writes a record if `expected` holds. The version field, if any, is
    /// written as given.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OptimisticLockConflict`] if the condition does
    /// not hold.
    pub fn put_if(&self, entity: &str, record: &Record, expected: &Expectation) -> CoreResult<()> {
        let schema = self.schema(entity)?;
        self.backend
            .put_if(&schema, &record.conform(&schema)?, expected)
    }

    /// Writes several records without version checks.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Records of earlier chunks stay written.
    pub fn batch_put(&self, entity: &str, records: &[Record]) -> CoreResult<()> {
        let schema = self.schema(entity)?;
        let records = records
            .iter()
            .map(|r| r.conform(&schema))
            .collect::<CoreResult<Vec<_>>>()?;
        self.backend.batch_put(&schema, &records)
    }

    /// Reads a record of a single-key entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingRangeKey`] for composite entities.
    pub fn get(&self, entity: &str, id: impl Into<Value>) -> CoreResult<Option<Record>> {
        self.get_key(entity, &id.into(), None)
    }

    /// Reads a record of a composite-key entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for single-key entities.
    pub fn get_composite(
        &self,
        entity: &str,
        id: impl Into<Value>,
        range: impl Into<Value>,
    ) -> CoreResult<Option<Record>> {
        self.get_key(entity, &id.into(), Some(&range.into()))
    }

    fn get_key(
        &self,
        entity: &str,
        id: &Value,
        range: Option<&Value>,
    ) -> CoreResult<Option<Record>> {
        let schema = self.schema(entity)?;
        let key = build_key(&schema, id, range)?;
        self.backend.get(&schema, &key, self.config().consistent_read)
    }

    /// Reads records by identity. Only a single key per call is supported.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] for more than one key.
    pub fn batch_get(&self, entity: &str, ids: &[Value]) -> CoreResult<Vec<Record>> {
        match ids {
            [] => Ok(Vec::new()),
            [id] => Ok(self.get_key(entity, id, None)?.into_iter().collect()),
            _ => Err(CoreError::unsupported(format!(
                "batch get of {} keys; read them one at a time",
                ids.len()
            ))),
        }
    }

    /// Deletes a record of a single-key entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingRangeKey`] for composite entities.
    pub fn delete(&self, entity: &str, id: impl Into<Value>) -> CoreResult<()> {
        let schema = self.schema(entity)?;
        let key = build_key(&schema, &id.into(), None)?;
        self.backend.delete(&schema, &key)
    }

    /// Deletes a record of a composite-key entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for single-key entities.
    pub fn delete_composite(
        &self,
        entity: &str,
        id: impl Into<Value>,
        range: impl Into<Value>,
    ) -> CoreResult<()> {
        let schema = self.schema(entity)?;
        let key = build_key(&schema, &id.into(), Some(&range.into()))?;
        self.backend.delete(&schema, &key)
    }

    /// Deletes the given records by their key fields.
    ///
    /// # Errors
    ///
    /// Returns key errors for records without key values and the first
    /// backend failure otherwise.
    pub fn batch_delete(&self, entity: &str, records: &[Record]) -> CoreResult<()> {
        let schema = self.schema(entity)?;
        let keys = records
            .iter()
            .map(|r| key_of(&schema, &r.conform(&schema)?))
            .collect::<CoreResult<Vec<_>>>()?;
        self.backend.batch_delete(&schema, &keys)
    }

    /// Starts a query. Reads use the configured consistency unless the
    /// query overrides it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownEntity`] for unregistered entities.
    pub fn query(&self, entity: &str) -> CoreResult<Query<'_>> {
        let schema = self.schema(entity)?;
        Ok(Query::new(&self.backend, schema, self.config().consistent_read))
    }

    /// Writes a model, updating it to the stored version.
    ///
    /// # Errors
    ///
    /// See [`put`](Self::put).
    pub fn put_model<M: Model>(&self, model: &mut M) -> CoreResult<()> {
        let mut record = model.to_record();
        self.put(M::ENTITY, &mut record)?;
        *model = M::from_record(&record)?;
        Ok(())
    }

    /// Reads a model by key. `range` is required for composite entities.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get) and [`Model::from_record`].
    pub fn get_model<M: Model>(
        &self,
        id: impl Into<Value>,
        range: Option<Value>,
    ) -> CoreResult<Option<M>> {
        self.get_key(M::ENTITY, &id.into(), range.as_ref())?
            .map(|record| M::from_record(&record))
            .transpose()
    }
}
