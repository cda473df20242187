//! Attribute store client trait and wire types.
//!
//! The attribute store keeps schema-less items inside named domains. Each
//! item has a name (its locator) and any number of attributes, each of
//! which may carry several string values. Reads beyond a single item go
//! through a textual select expression.

use crate::error::StorageResult;
use std::collections::BTreeMap;

/// Maximum number of items in one batch put or batch delete call.
pub const MAX_BATCH_ITEMS: usize = 25;

/// Name of the synthetic item returned by `select count(*)`.
pub const COUNT_ITEM_NAME: &str = "Domain";

/// Attribute holding the result of `select count(*)`.
pub const COUNT_ATTRIBUTE: &str = "Count";

/// An item as returned by the attribute store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeItem {
    /// The item name.
    pub name: String,
    /// Attribute name to its values.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl AttributeItem {
    /// Creates an item with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a value to an attribute.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .entry(attribute.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Returns the first value of an attribute.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value of an attribute.
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes.get(attribute).map_or(&[], Vec::as_slice)
    }
}

/// One attribute value to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceableAttribute {
    /// Attribute name.
    pub name: String,
    /// Value to store.
    pub value: String,
    /// Whether existing values of this attribute are dropped first.
    pub replace: bool,
}

impl ReplaceableAttribute {
    /// Creates a replacing attribute write.
    pub fn replace(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: true,
        }
    }
}

/// Precondition attached to a put or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCondition {
    /// Attribute the condition is about.
    pub name: String,
    /// Value the attribute must currently hold (when `exists` is true).
    pub value: Option<String>,
    /// Whether the attribute must exist. `false` means it must be absent.
    pub exists: bool,
}

/// Writes attributes of a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAttributesRequest {
    /// Target domain.
    pub domain: String,
    /// Target item.
    pub item_name: String,
    /// Attribute values to write.
    pub attributes: Vec<ReplaceableAttribute>,
    /// Optional precondition.
    pub expected: Option<UpdateCondition>,
}

/// One item of a batch put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceableItem {
    /// Item name.
    pub name: String,
    /// Attribute values to write.
    pub attributes: Vec<ReplaceableAttribute>,
}

/// Writes several items without preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPutAttributesRequest {
    /// Target domain.
    pub domain: String,
    /// Items to write, at most [`MAX_BATCH_ITEMS`].
    pub items: Vec<ReplaceableItem>,
}

/// Reads the attributes of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAttributesRequest {
    /// Source domain.
    pub domain: String,
    /// Item to read.
    pub item_name: String,
    /// Attributes to return; empty returns all of them.
    pub attribute_names: Vec<String>,
    /// Whether the read must observe all prior writes.
    pub consistent_read: bool,
}

/// Deletes an item or some of its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAttributesRequest {
    /// Target domain.
    pub domain: String,
    /// Target item.
    pub item_name: String,
    /// Attributes to remove; empty removes the whole item.
    pub attribute_names: Vec<String>,
    /// Optional precondition.
    pub expected: Option<UpdateCondition>,
}

/// Deletes several whole items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDeleteAttributesRequest {
    /// Target domain.
    pub domain: String,
    /// Items to delete, at most [`MAX_BATCH_ITEMS`].
    pub item_names: Vec<String>,
}

/// Runs a select expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRequest {
    /// The select statement.
    pub select_expression: String,
    /// Continuation token from a previous response.
    pub next_token: Option<String>,
    /// Whether the read must observe all prior writes.
    pub consistent_read: bool,
}

/// One page of select results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectResponse {
    /// Matching items.
    pub items: Vec<AttributeItem>,
    /// Present when more results are available.
    pub next_token: Option<String>,
}

/// Client for an attribute store service.
///
/// Implementations must be safe to share across threads; one client is
/// typically reused for every query in the process.
pub trait AttributeStoreClient: Send + Sync {
    /// Writes attributes of one item, honouring `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ConditionalCheckFailed`] if the
    /// precondition does not hold.
    fn put_attributes(&self, request: &PutAttributesRequest) -> StorageResult<()>;

    /// Writes several items.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::BatchTooLarge`] above
    /// [`MAX_BATCH_ITEMS`] items.
    fn batch_put_attributes(&self, request: &BatchPutAttributesRequest) -> StorageResult<()>;

    /// Reads one item. Returns `None` if the item has no attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain does not exist.
    fn get_attributes(&self, request: &GetAttributesRequest)
        -> StorageResult<Option<AttributeItem>>;

    /// Deletes an item or some of its attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain does not exist or the precondition
    /// does not hold.
    fn delete_attributes(&self, request: &DeleteAttributesRequest) -> StorageResult<()>;

    /// Deletes several items.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::BatchTooLarge`] above
    /// [`MAX_BATCH_ITEMS`] items.
    fn batch_delete_attributes(&self, request: &BatchDeleteAttributesRequest)
        -> StorageResult<()>;

    /// Runs a select expression and returns one page of results.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidExpression`] for malformed
    /// statements.
    fn select(&self, request: &SelectRequest) -> StorageResult<SelectResponse>;
}
