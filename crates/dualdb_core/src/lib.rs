//! # DualDB Core
//!
//! Entity persistence over two kinds of storage service.
//!
//! This crate provides:
//! - Entity schemas and a registry to look them up by name
//! - Storage keys for single and composite (hash + range) identities
//! - Validated filter conditions and a query builder with cursor paging
//! - Translators for an attribute store and a key/range store
//! - Optimistic locking through a version field
//! - [`EntityStore`], the facade tying these together
//!
//! ## Example
//!
//! ```rust
//! use dualdb_codec::{FieldType, Value};
//! use dualdb_core::{Config, EntitySchema, EntityStore, Record, SchemaRegistry};
//! use dualdb_storage::InMemoryAttributeStore;
//! use std::sync::Arc;
//!
//! let service = Arc::new(InMemoryAttributeStore::new());
//! service.create_domain("person");
//! let store =
//!     EntityStore::attribute_store(service, Arc::new(SchemaRegistry::new()), Config::default())
//!         .unwrap();
//! store
//!     .register(
//!         EntitySchema::builder("person")
//!             .identity("name", FieldType::String)
//!             .field("age", FieldType::Int)
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let mut abc = Record::new().with("name", "abc").with("age", 25);
//! store.put("person", &mut abc).unwrap();
//! let found = store.get("person", "abc").unwrap().unwrap();
//! assert_eq!(found.value("age"), &Value::Int(25));
//!
//! store.delete("person", "abc").unwrap();
//! assert!(store.get("person", "abc").unwrap().is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod filter;
mod key;
mod query;
mod record;
mod schema;
mod store;
mod version;

pub use backend::{
    route, AttributeStoreBackend, Backend, BackendKind, BackendTranslator, Expectation,
    KeyRangeBackend, Route,
};
pub use config::{Config, DEFAULT_BATCH_WRITE_LIMIT};
pub use error::{CoreError, CoreResult, ErrorCategory, INVALID_RESPONSE};
pub use filter::{Arity, Condition, Operator};
pub use key::{build_key, key_of, parse_key, StorageKey};
pub use query::{
    Direction, PaginationCursor, Query, QueryPage, QuerySpec, SelectShape, SortTerm,
};
pub use record::{Model, Record};
pub use schema::{
    EntitySchema, EntitySchemaBuilder, FieldDescriptor, FieldRole, KeyScheme, SchemaRegistry,
};
pub use store::EntityStore;
pub use version::VersionGuard;
