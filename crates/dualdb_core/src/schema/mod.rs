//! Entity schemas.
//!
//! A schema is the descriptor table for one model type: its table, its
//! fields with their logical types and attribute names, and which fields
//! form the key. Schemas are validated once, when built, and are immutable
//! afterwards.

mod entity;
mod field;
mod registry;

pub use entity::{EntitySchema, EntitySchemaBuilder, KeyScheme};
pub use field::{FieldDescriptor, FieldRole};
pub use registry::SchemaRegistry;
