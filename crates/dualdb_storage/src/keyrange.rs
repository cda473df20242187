//! Key/range store client trait and wire types.
//!
//! The key/range store addresses items by a hash key and an optional range
//! key. Reads either *query* one hash key (optionally constraining and
//! ordering by the range key) or *scan* the whole table with filters.

use crate::error::StorageResult;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of writes in one batch write call.
pub const MAX_BATCH_WRITES: usize = 25;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, as decimal text.
    N(String),
    /// Set of strings.
    SS(Vec<String>),
    /// Set of numbers.
    NS(Vec<String>),
}

impl AttributeValue {
    /// Returns the scalar text of an `S` or `N` value.
    pub fn scalar_text(&self) -> Option<&str> {
        match self {
            Self::S(s) | Self::N(s) => Some(s),
            Self::SS(_) | Self::NS(_) => None,
        }
    }

    /// Returns the elements of an `SS` or `NS` value.
    pub fn set_values(&self) -> Option<&[String]> {
        match self {
            Self::SS(v) | Self::NS(v) => Some(v),
            Self::S(_) | Self::N(_) => None,
        }
    }

    /// Compares two scalar values of the same kind.
    ///
    /// Strings compare lexicographically, numbers numerically. Values of
    /// different kinds, and sets, are not comparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::S(a), Self::S(b)) => Some(a.cmp(b)),
            (Self::N(a), Self::N(b)) => compare_numbers(a, b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "S:{s}"),
            Self::N(n) => write!(f, "N:{n}"),
            Self::SS(v) => write!(f, "SS:{v:?}"),
            Self::NS(v) => write!(f, "NS:{v:?}"),
        }
    }
}

/// Compares two decimal number strings.
pub fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    match (a.parse::<i128>(), b.parse::<i128>()) {
        (Ok(x), Ok(y)) => Some(x.cmp(&y)),
        _ => {
            let x = a.parse::<f64>().ok()?;
            let y = b.parse::<f64>().ok()?;
            x.partial_cmp(&y)
        }
    }
}

/// An item: attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;

/// Names of the key attributes of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Hash key attribute.
    pub hash_key: String,
    /// Range key attribute, if the table has one.
    pub range_key: Option<String>,
}

impl KeySchema {
    /// Key schema with only a hash key.
    pub fn hash(hash_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: None,
        }
    }

    /// Key schema with a hash and a range key.
    pub fn hash_range(hash_key: impl Into<String>, range_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: Some(range_key.into()),
        }
    }

    /// Extracts the key attributes of an item.
    pub fn key_of(&self, item: &Item) -> Option<Item> {
        let mut key = Item::new();
        key.insert(self.hash_key.clone(), item.get(&self.hash_key)?.clone());
        if let Some(range_key) = &self.range_key {
            key.insert(range_key.clone(), item.get(range_key)?.clone());
        }
        Some(key)
    }
}

/// Comparison operators understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than or equal.
    Le,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Greater than.
    Gt,
    /// Attribute is present.
    NotNull,
    /// Attribute is absent.
    Null,
    /// Substring or set membership.
    Contains,
    /// Negated `Contains`.
    NotContains,
    /// String prefix.
    BeginsWith,
    /// Equal to any of the values.
    In,
    /// Inclusive range.
    Between,
}

impl ComparisonOperator {
    /// Wire name of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Le => "LE",
            Self::Lt => "LT",
            Self::Ge => "GE",
            Self::Gt => "GT",
            Self::NotNull => "NOT_NULL",
            Self::Null => "NULL",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::BeginsWith => "BEGINS_WITH",
            Self::In => "IN",
            Self::Between => "BETWEEN",
        }
    }

    /// Whether the operator may constrain the range key of a query.
    pub const fn is_key_condition(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Le | Self::Lt | Self::Ge | Self::Gt | Self::BeginsWith | Self::Between
        )
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator with its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// The operator.
    pub operator: ComparisonOperator,
    /// Operands; count depends on the operator.
    pub values: Vec<AttributeValue>,
}

impl Condition {
    /// Creates a condition.
    pub fn new(operator: ComparisonOperator, values: Vec<AttributeValue>) -> Self {
        Self { operator, values }
    }
}

/// A condition bound to one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCondition {
    /// Attribute name.
    pub attribute: String,
    /// Condition on it.
    pub condition: Condition,
}

/// Precondition on one attribute of a put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedAttribute {
    /// Value the attribute must currently hold (when `exists` is true).
    pub value: Option<AttributeValue>,
    /// Whether the attribute must exist. `false` means it must be absent.
    pub exists: bool,
}

/// Writes a whole item, replacing any previous version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutItemRequest {
    /// Target table.
    pub table: String,
    /// The item, including its key attributes.
    pub item: Item,
    /// Preconditions by attribute name.
    pub expected: BTreeMap<String, ExpectedAttribute>,
}

/// Reads one item by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetItemRequest {
    /// Source table.
    pub table: String,
    /// Key attributes.
    pub key: Item,
    /// Attributes to return; empty returns all of them.
    pub attributes_to_get: Vec<String>,
    /// Whether the read must observe all prior writes.
    pub consistent_read: bool,
}

/// Deletes one item by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItemRequest {
    /// Target table.
    pub table: String,
    /// Key attributes.
    pub key: Item,
}

/// One write of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    /// Put a whole item.
    Put(Item),
    /// Delete by key.
    Delete(Item),
}

/// Several unconditional writes against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWriteItemRequest {
    /// Target table.
    pub table: String,
    /// Writes, at most [`MAX_BATCH_WRITES`].
    pub writes: Vec<WriteRequest>,
}

/// Reads the items of one hash key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Source table.
    pub table: String,
    /// Hash key attribute name.
    pub hash_key: String,
    /// Hash key value (equality).
    pub hash_value: AttributeValue,
    /// Optional condition on the range key.
    pub range_condition: Option<AttributeCondition>,
    /// Attributes to return; empty returns all of them.
    pub attributes_to_get: Vec<String>,
    /// Maximum items per page.
    pub limit: Option<usize>,
    /// Ascending range key order when true.
    pub scan_index_forward: bool,
    /// Resume after this key.
    pub exclusive_start_key: Option<Item>,
    /// Whether the read must observe all prior writes.
    pub consistent_read: bool,
    /// Return only the count of matching items.
    pub count_only: bool,
}

/// Reads the whole table through filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Source table.
    pub table: String,
    /// Conditions that must all hold.
    pub scan_filter: Vec<AttributeCondition>,
    /// Attributes to return; empty returns all of them.
    pub attributes_to_get: Vec<String>,
    /// Maximum items per page.
    pub limit: Option<usize>,
    /// Resume after this key.
    pub exclusive_start_key: Option<Item>,
    /// Whether the read must observe all prior writes.
    pub consistent_read: bool,
    /// Return only the count of matching items.
    pub count_only: bool,
}

/// One page of query or scan results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    /// Matching items; empty for count-only requests.
    pub items: Vec<Item>,
    /// Number of matching items in this page.
    pub count: usize,
    /// Present when more results are available.
    pub last_evaluated_key: Option<Item>,
}

/// Client for a key/range store service.
pub trait KeyRangeClient: Send + Sync {
    /// Returns the key schema of a table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NoSuchTable`] for unknown tables.
    fn describe_table(&self, table: &str) -> StorageResult<KeySchema>;

    /// Writes an item, honouring `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ConditionalCheckFailed`] if a
    /// precondition does not hold.
    fn put_item(&self, request: &PutItemRequest) -> StorageResult<()>;

    /// Reads one item.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the key is invalid.
    fn get_item(&self, request: &GetItemRequest) -> StorageResult<Option<Item>>;

    /// Deletes one item. Deleting a missing item succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the key is invalid.
    fn delete_item(&self, request: &DeleteItemRequest) -> StorageResult<()>;

    /// Applies several writes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::BatchTooLarge`] above
    /// [`MAX_BATCH_WRITES`] writes.
    fn batch_write_item(&self, request: &BatchWriteItemRequest) -> StorageResult<()>;

    /// Queries one hash key.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tables or operators that are not legal
    /// on the range key.
    fn query(&self, request: &QueryRequest) -> StorageResult<QueryOutput>;

    /// Scans the table.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tables.
    fn scan(&self, request: &ScanRequest) -> StorageResult<QueryOutput>;
}
