//! # DualDB Storage
//!
//! Client traits, wire types and in-memory implementations for the two
//! storage services DualDB runs on.
//!
//! Clients are **thin transports**: they carry requests and return what the
//! service answered. Translating entity queries into requests is the job of
//! `dualdb_core`.
//!
//! ## Services
//!
//! - [`AttributeStoreClient`] - schema-less items in domains, multi-valued
//!   string attributes, reads through a textual [`select`] language
//! - [`KeyRangeClient`] - typed items addressed by hash and range key, reads
//!   through query (one hash key) or scan (whole table)
//!
//! ## Available Implementations
//!
//! - [`InMemoryAttributeStore`] - For testing and local development
//! - [`InMemoryKeyRangeStore`] - For testing and local development
//!
//! ## Example
//!
//! ```rust
//! use dualdb_storage::{
//!     AttributeValue, GetItemRequest, InMemoryKeyRangeStore, Item, KeyRangeClient, KeySchema,
//!     PutItemRequest,
//! };
//! use std::collections::BTreeMap;
//!
//! let store = InMemoryKeyRangeStore::new();
//! store.create_table("people", KeySchema::hash("id"));
//!
//! let mut item = Item::new();
//! item.insert("id".to_string(), AttributeValue::S("abc".to_string()));
//! store
//!     .put_item(&PutItemRequest {
//!         table: "people".to_string(),
//!         item: item.clone(),
//!         expected: BTreeMap::new(),
//!     })
//!     .unwrap();
//!
//! let found = store
//!     .get_item(&GetItemRequest {
//!         table: "people".to_string(),
//!         key: item.clone(),
//!         attributes_to_get: vec![],
//!         consistent_read: true,
//!     })
//!     .unwrap();
//! assert_eq!(found, Some(item));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attribute;
mod error;
mod keyrange;
mod memory;
pub mod select;

pub use attribute::{
    AttributeItem, AttributeStoreClient, BatchDeleteAttributesRequest, BatchPutAttributesRequest,
    DeleteAttributesRequest, GetAttributesRequest, PutAttributesRequest, ReplaceableAttribute,
    ReplaceableItem, SelectRequest, SelectResponse, UpdateCondition, COUNT_ATTRIBUTE,
    COUNT_ITEM_NAME, MAX_BATCH_ITEMS,
};
pub use error::{StorageError, StorageResult};
pub use keyrange::{
    compare_numbers, AttributeCondition, AttributeValue, BatchWriteItemRequest,
    ComparisonOperator, Condition, DeleteItemRequest, ExpectedAttribute, GetItemRequest, Item,
    KeyRangeClient, KeySchema, PutItemRequest, QueryOutput, QueryRequest, ScanRequest,
    WriteRequest, MAX_BATCH_WRITES,
};
pub use memory::{
    condition_holds, InMemoryAttributeStore, InMemoryKeyRangeStore, DEFAULT_SELECT_LIMIT,
};
