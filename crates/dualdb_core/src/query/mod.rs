//! Query builder and execution state.
//!
//! A [`Query`] collects a select list, filter conditions, one sort term, a
//! row limit and a consistency flag for one entity, validating each piece
//! as it is added. It is then run batch by batch:
//!
//! ```rust
//! use dualdb_codec::FieldType;
//! use dualdb_core::{
//!     Backend, Config, Direction, EntitySchema, EntityStore, Record, SchemaRegistry,
//! };
//! use dualdb_storage::InMemoryAttributeStore;
//! use std::sync::Arc;
//!
//! let service = Arc::new(InMemoryAttributeStore::new());
//! service.create_domain("person");
//! let backend = Backend::attribute_store(service, Config::default());
//! let store = EntityStore::new(backend, Arc::new(SchemaRegistry::new())).unwrap();
//! store
//!     .register(
//!         EntitySchema::builder("person")
//!             .identity("name", FieldType::String)
//!             .field("age", FieldType::Int)
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//! for (name, age) in [("a", 30), ("b", 20), ("c", 40)] {
//!     let mut record = Record::new().with("name", name).with("age", age);
//!     store.put("person", &mut record).unwrap();
//! }
//!
//! let mut query = store
//!     .query("person")
//!     .unwrap()
//!     .where_gt("age", 25)
//!     .unwrap()
//!     .order_by("age", Direction::Descending)
//!     .unwrap();
//! let names: Vec<_> = query
//!     .collect_all()
//!     .unwrap()
//!     .iter()
//!     .map(|r| r.value("name").to_string())
//!     .collect();
//! assert_eq!(names, ["c", "a"]);
//! ```

mod cursor;
mod shape;

pub use cursor::PaginationCursor;
pub use shape::SelectShape;

use crate::backend::{Backend, BackendTranslator};
use crate::error::{CoreError, CoreResult};
use crate::filter::{Condition, Operator};
use crate::record::Record;
use crate::schema::EntitySchema;
use dualdb_codec::Value;
use std::sync::Arc;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One sort term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    /// Field to sort by.
    pub field: String,
    /// Direction.
    pub direction: Direction,
}

/// Everything a backend needs to translate a query.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    /// Entity queried.
    pub schema: Arc<EntitySchema>,
    /// Selected fields; empty selects all of them.
    pub selected: Vec<String>,
    /// Conditions, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Sort terms. Both backends sort on at most one field.
    pub order: Vec<SortTerm>,
    /// Rows per batch.
    pub limit: Option<usize>,
    /// Strongly consistent reads.
    pub consistent: bool,
}

impl QuerySpec {
    /// Creates an unfiltered spec selecting every field.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            selected: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            consistent: false,
        }
    }

    /// Classifies the select list.
    pub fn shape(&self) -> SelectShape {
        SelectShape::classify(&self.schema, &self.selected)
    }

    /// The sort term, if any.
    pub fn sort(&self) -> Option<&SortTerm> {
        self.order.first()
    }

    /// Returns true if some condition constrains `field`.
    pub fn constrains(&self, field: &str) -> bool {
        self.conditions.iter().any(|c| c.field() == field)
    }
}

/// One batch of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    /// Decoded records.
    pub records: Vec<Record>,
    /// Present when more results may follow.
    pub cursor: Option<PaginationCursor>,
}

/// A query against one entity.
///
/// Not meant for concurrent use: each traversal belongs to one caller.
#[derive(Debug)]
pub struct Query<'a> {
    backend: &'a Backend,
    spec: QuerySpec,
    started: bool,
    cursor: Option<PaginationCursor>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(backend: &'a Backend, schema: Arc<EntitySchema>, consistent: bool) -> Self {
        let mut spec = QuerySpec::new(schema);
        spec.consistent = consistent;
        Self {
            backend,
            spec,
            started: false,
            cursor: None,
        }
    }

    /// The translated state of this query.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Classification of the current select list.
    pub fn shape(&self) -> SelectShape {
        self.spec.shape()
    }

    /// Restricts the fields returned.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown fields, and
    /// [`CoreError::UnsupportedOrderBy`] if the sort field can no longer be
    /// sorted on with this selection.
    pub fn select(mut self, fields: &[&str]) -> CoreResult<Self> {
        let mut selected: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            self.spec.schema.require_field(field)?;
            if !selected.iter().any(|s| s == field) {
                selected.push((*field).to_string());
            }
        }
        for term in &self.spec.order {
            self.backend
                .kind()
                .check_order_by(&self.spec.schema, &selected, &term.field)?;
        }
        self.spec.selected = selected;
        Ok(self)
    }

    /// Adds a condition.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn filter(
        mut self,
        field: &str,
        operator: Operator,
        operands: Vec<Value>,
    ) -> CoreResult<Self> {
        let condition = Condition::new(
            &self.spec.schema,
            self.backend.kind(),
            field,
            operator,
            operands,
        )?;
        self.spec.conditions.push(condition);
        Ok(self)
    }

    /// Adds `field = value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Eq, vec![value.into()])
    }

    /// Adds `field != value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_ne(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Ne, vec![value.into()])
    }

    /// Adds `field < value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_lt(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Lt, vec![value.into()])
    }

    /// Adds `field <= value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_le(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Le, vec![value.into()])
    }

    /// Adds `field > value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_gt(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Gt, vec![value.into()])
    }

    /// Adds `field >= value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_ge(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Ge, vec![value.into()])
    }

    /// Adds `low <= field <= high`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_between(
        self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> CoreResult<Self> {
        self.filter(field, Operator::Between, vec![low.into(), high.into()])
    }

    /// Adds `field in (values)`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_in<V: Into<Value>>(
        self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> CoreResult<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(field, Operator::In, values)
    }

    /// Adds `field like pattern`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_like(self, field: &str, pattern: &str) -> CoreResult<Self> {
        self.filter(field, Operator::Like, vec![pattern.into()])
    }

    /// Adds a text prefix condition.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_begins_with(self, field: &str, prefix: &str) -> CoreResult<Self> {
        self.filter(field, Operator::BeginsWith, vec![prefix.into()])
    }

    /// Adds a substring or set membership condition.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_contains(self, field: &str, value: impl Into<Value>) -> CoreResult<Self> {
        self.filter(field, Operator::Contains, vec![value.into()])
    }

    /// Adds `field is null`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_null(self, field: &str) -> CoreResult<Self> {
        self.filter(field, Operator::IsNull, Vec::new())
    }

    /// Adds `field is not null`.
    ///
    /// # Errors
    ///
    /// See [`Condition::new`].
    pub fn where_not_null(self, field: &str) -> CoreResult<Self> {
        self.filter(field, Operator::NotNull, Vec::new())
    }

    /// Sorts the results.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOrderBy`] if the backend cannot sort
    /// on `field` or a sort term is already set.
    pub fn order_by(mut self, field: &str, direction: Direction) -> CoreResult<Self> {
        self.backend
            .kind()
            .check_order_by(&self.spec.schema, &self.spec.selected, field)?;
        if let Some(existing) = self.spec.sort() {
            return Err(CoreError::UnsupportedOrderBy {
                entity: self.spec.schema.name().to_string(),
                field: field.to_string(),
                message: format!("already ordered by {}", existing.field),
            });
        }
        self.spec.order.push(SortTerm {
            field: field.to_string(),
            direction,
        });
        Ok(self)
    }

    /// Caps the rows returned per batch.
    ///
    /// # Errors
    ///
    /// Returns a validation error for zero.
    pub fn limit(mut self, limit: usize) -> CoreResult<Self> {
        if limit == 0 {
            return Err(CoreError::validation("limit must be at least 1"));
        }
        self.spec.limit = Some(limit);
        Ok(self)
    }

    /// Sets read consistency.
    #[must_use]
    pub fn consistent(mut self, consistent: bool) -> Self {
        self.spec.consistent = consistent;
        self
    }

    /// Counts matching records. Independent of [`run`](Self::run) state.
    ///
    /// # Errors
    ///
    /// Returns backend errors, or [`CoreError::OrderByRequiresQuery`] on
    /// the key/range backend when the query has to scan.
    pub fn count(&self) -> CoreResult<u64> {
        self.backend.query_count(&self.spec)
    }

    /// Fetches the next batch.
    ///
    /// The first call starts from the beginning; later calls continue from
    /// the cursor. Once exhausted every call returns an empty batch.
    ///
    /// # Errors
    ///
    /// Returns backend errors, or [`CoreError::OrderByRequiresQuery`] on
    /// the key/range backend when the query has to scan.
    pub fn run(&mut self) -> CoreResult<Vec<Record>> {
        if self.started && self.cursor.is_none() {
            return Ok(Vec::new());
        }

        let page = self.backend.query_run(&self.spec, self.cursor.as_ref())?;
        self.started = true;
        self.cursor = page.cursor;
        tracing::trace!(
            entity = self.spec.schema.name(),
            rows = page.records.len(),
            cursor = ?self.cursor.as_ref().map(PaginationCursor::describe),
            "query batch"
        );
        Ok(page.records)
    }

    /// True before the first run, then whether a cursor is held.
    pub fn has_next(&self) -> bool {
        !self.started || self.cursor.is_some()
    }

    /// Forgets the cursor; the next run starts from the beginning.
    pub fn reset(&mut self) {
        self.started = false;
        self.cursor = None;
    }

    /// Resets and runs to exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the first error of any batch.
    pub fn collect_all(&mut self) -> CoreResult<Vec<Record>> {
        self.reset();
        let mut records = Vec::new();
        while self.has_next() {
            records.extend(self.run()?);
        }
        Ok(records)
    }
}
