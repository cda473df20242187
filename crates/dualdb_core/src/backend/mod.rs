//! Backend translators.
//!
//! A translator turns entity-level operations into requests of one storage
//! service. There are exactly two, so [`Backend`] is a closed enum over
//! them rather than an open plugin point:
//!
//! - [`AttributeStoreBackend`] - textual select statements, continuation
//!   tokens, identity keys stored as item names
//! - [`KeyRangeBackend`] - structured query or scan requests, last evaluated
//!   keys, native number and set attribute types

mod attribute;
mod keyrange;

pub use attribute::AttributeStoreBackend;
pub use keyrange::{route, KeyRangeBackend, Route};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::filter::Operator;
use crate::key::StorageKey;
use crate::query::{PaginationCursor, QueryPage, QuerySpec};
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDescriptor};
use dualdb_codec::{is_encodable, Value};
use dualdb_storage::{AttributeStoreClient, KeyRangeClient};
use std::fmt;
use std::sync::Arc;

/// Which storage service a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Schema-less items with a textual select language.
    AttributeStore,
    /// Hash and range keyed items read through query or scan.
    KeyRange,
}

impl BackendKind {
    /// Returns true if the backend can evaluate `operator` on `field`.
    pub fn supports(self, operator: Operator, field: &FieldDescriptor) -> bool {
        match (self, operator) {
            (Self::AttributeStore, Operator::NotContains) => !field.field_type().is_set(),
            (Self::KeyRange, Operator::Like | Operator::NotLike) => false,
            _ => true,
        }
    }

    /// Checks that results can be sorted on `field`.
    ///
    /// The key/range store only sorts on the range key. The attribute store
    /// sorts on any scalar attribute, as long as it is part of the select
    /// list when one is given.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown fields and
    /// [`CoreError::UnsupportedOrderBy`] otherwise.
    pub fn check_order_by(
        self,
        schema: &EntitySchema,
        selected: &[String],
        field: &str,
    ) -> CoreResult<()> {
        let descriptor = schema.require_field(field)?;
        let reject = |message: &str| CoreError::UnsupportedOrderBy {
            entity: schema.name().to_string(),
            field: field.to_string(),
            message: message.to_string(),
        };

        match self {
            Self::KeyRange => match schema.range_field() {
                Some(range) if range.name() == field => Ok(()),
                Some(_) => Err(reject("only the range key can be sorted on")),
                None => Err(reject("entity has no range key to sort on")),
            },
            Self::AttributeStore => {
                let field_type = descriptor.field_type();
                if field_type.is_set() || !is_encodable(field_type) {
                    return Err(reject("only scalar fields can be sorted on"));
                }
                if !selected.is_empty() && !selected.iter().any(|s| s == field) {
                    return Err(reject("sort field must be selected"));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AttributeStore => "attribute store",
            Self::KeyRange => "key/range",
        })
    }
}

/// Precondition of a conditional put.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    /// Field the condition is about.
    pub field: String,
    /// Value the field must currently hold, when `exists` is true.
    pub value: Option<Value>,
    /// Whether the field must exist. `false` means it must be absent.
    pub exists: bool,
}

impl Expectation {
    /// The field must currently hold `value`.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: Some(value.into()),
            exists: true,
        }
    }

    /// The field must be absent.
    pub fn absent(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
            exists: false,
        }
    }
}

/// Entity-level operations every backend provides.
///
/// Records passed in are expected to conform to the schema; see
/// [`Record::conform`].
pub trait BackendTranslator: Send + Sync {
    /// Which service this translator targets.
    fn kind(&self) -> BackendKind;

    /// Writes a record, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns key errors for records without key values and
    /// [`CoreError::Backend`] for service failures.
    fn put(&self, schema: &EntitySchema, record: &Record) -> CoreResult<()>;

    /// Writes a record if `expected` holds for the stored version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OptimisticLockConflict`] if it does not.
    fn put_if(&self, schema: &EntitySchema, record: &Record, expected: &Expectation)
        -> CoreResult<()>;

    /// Writes several records without preconditions, in chunks.
    ///
    /// # Errors
    ///
    /// Returns the first failing chunk's error. Earlier chunks stay
    /// written.
    fn batch_put(&self, schema: &EntitySchema, records: &[Record]) -> CoreResult<()>;

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Backend`] for service failures and codec or key
    /// errors if the stored item does not decode.
    fn get(
        &self,
        schema: &EntitySchema,
        key: &StorageKey,
        consistent: bool,
    ) -> CoreResult<Option<Record>>;

    /// Deletes one record. Deleting a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Backend`] for service failures.
    fn delete(&self, schema: &EntitySchema, key: &StorageKey) -> CoreResult<()>;

    /// Deletes several records, in chunks.
    ///
    /// # Errors
    ///
    /// Returns the first failing chunk's error.
    fn batch_delete(&self, schema: &EntitySchema, keys: &[StorageKey]) -> CoreResult<()>;

    /// Counts the records matching a query.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Backend`] for service failures.
    fn query_count(&self, spec: &QuerySpec) -> CoreResult<u64>;

    /// Fetches one batch of a query, starting after `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Backend`] for service failures and a validation
    /// error for a cursor issued by the other backend.
    fn query_run(&self, spec: &QuerySpec, cursor: Option<&PaginationCursor>)
        -> CoreResult<QueryPage>;
}

/// One of the two translators.
#[derive(Debug)]
pub enum Backend {
    /// Attribute store translator.
    AttributeStore(AttributeStoreBackend),
    /// Key/range store translator.
    KeyRange(KeyRangeBackend),
}

impl Backend {
    /// Creates an attribute store backend.
    pub fn attribute_store(client: Arc<dyn AttributeStoreClient>, config: Config) -> Self {
        Self::AttributeStore(AttributeStoreBackend::new(client, config))
    }

    /// Creates a key/range store backend.
    pub fn key_range(client: Arc<dyn KeyRangeClient>, config: Config) -> Self {
        Self::KeyRange(KeyRangeBackend::new(client, config))
    }

    /// The configuration the backend was created with.
    pub fn config(&self) -> &Config {
        match self {
            Self::AttributeStore(backend) => backend.config(),
            Self::KeyRange(backend) => backend.config(),
        }
    }

    fn translator(&self) -> &dyn BackendTranslator {
        match self {
            Self::AttributeStore(backend) => backend,
            Self::KeyRange(backend) => backend,
        }
    }
}

impl BackendTranslator for Backend {
    fn kind(&self) -> BackendKind {
        self.translator().kind()
    }

    fn put(&self, schema: &EntitySchema, record: &Record) -> CoreResult<()> {
        self.translator().put(schema, record)
    }

    fn put_if(
        &self,
        schema: &EntitySchema,
        record: &Record,
        expected: &Expectation,
    ) -> CoreResult<()> {
        self.translator().put_if(schema, record, expected)
    }

    fn batch_put(&self, schema: &EntitySchema, records: &[Record]) -> CoreResult<()> {
        self.translator().batch_put(schema, records)
    }

    fn get(
        &self,
        schema: &EntitySchema,
        key: &StorageKey,
        consistent: bool,
    ) -> CoreResult<Option<Record>> {
        self.translator().get(schema, key, consistent)
    }

    fn delete(&self, schema: &EntitySchema, key: &StorageKey) -> CoreResult<()> {
        self.translator().delete(schema, key)
    }

    fn batch_delete(&self, schema: &EntitySchema, keys: &[StorageKey]) -> CoreResult<()> {
        self.translator().batch_delete(schema, keys)
    }

    fn query_count(&self, spec: &QuerySpec) -> CoreResult<u64> {
        self.translator().query_count(spec)
    }

    fn query_run(
        &self,
        spec: &QuerySpec,
        cursor: Option<&PaginationCursor>,
    ) -> CoreResult<QueryPage> {
        self.translator().query_run(spec, cursor)
    }
}

/// Physical batch size: the configured limit, capped by the service limit.
pub(crate) fn chunk_size(config: &Config, service_limit: usize) -> usize {
    config.batch_write_limit.clamp(1, service_limit)
}
