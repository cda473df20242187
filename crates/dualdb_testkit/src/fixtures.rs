//! Test fixtures and store helpers.
//!
//! Every store built here runs on an in-memory service with the sample
//! schemas registered and their tables created.

use dualdb_codec::{FieldType, ScalarType, Value};
use dualdb_core::{
    BackendKind, Config, CoreResult, EntitySchema, EntityStore, Model, Record, SchemaRegistry,
};
use dualdb_storage::{InMemoryAttributeStore, InMemoryKeyRangeStore, KeySchema};
use std::sync::{Arc, Once};

/// Single-key sample entity: `name` (string identity), `age`, `tags`.
pub const PERSON: &str = "person";

/// Composite-key sample entity: `id` (long hash), `name` (string range),
/// `count`.
pub const ITEM: &str = "item";

/// Versioned sample entity: `id` (string identity), `body`, `version`.
pub const DOC: &str = "doc";

/// Schema of [`PERSON`].
pub fn person_schema() -> EntitySchema {
    EntitySchema::builder(PERSON)
        .identity("name", FieldType::String)
        .field("age", FieldType::Int)
        .field("tags", FieldType::Set(ScalarType::String))
        .build()
        .expect("person schema is valid")
}

/// Schema of [`ITEM`].
pub fn item_schema() -> EntitySchema {
    EntitySchema::builder(ITEM)
        .hash_key("id", FieldType::Long)
        .range_key("name", FieldType::String)
        .field("count", FieldType::Int)
        .build()
        .expect("item schema is valid")
}

/// Schema of [`DOC`].
pub fn doc_schema() -> EntitySchema {
    EntitySchema::builder(DOC)
        .identity("id", FieldType::String)
        .field("body", FieldType::String)
        .version("version", FieldType::Long)
        .build()
        .expect("doc schema is valid")
}

/// A person record.
pub fn person(name: &str, age: i32) -> Record {
    Record::new().with("name", name).with("age", age)
}

/// An item record named `item<n>`.
pub fn item(id: i64, n: i32) -> Record {
    Record::new()
        .with("id", id)
        .with("name", format!("item{n}"))
        .with("count", n)
}

/// A doc record without a version.
pub fn doc(id: &str, body: &str) -> Record {
    Record::new().with("id", id).with("body", body)
}

/// [`PERSON`] as a typed model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Identity.
    pub name: String,
    /// Age in years.
    pub age: Option<i32>,
}

impl Model for Person {
    const ENTITY: &'static str = PERSON;

    fn schema() -> CoreResult<EntitySchema> {
        Ok(person_schema())
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("age", self.age)
    }

    fn from_record(record: &Record) -> CoreResult<Self> {
        let name = record.require("name")?.to_string();
        let age = match record.value("age") {
            Value::Int(age) => Some(*age),
            _ => None,
        };
        Ok(Self { name, age })
    }
}

/// An entity store on an in-memory service.
pub struct TestStore {
    /// The store under test.
    pub store: EntityStore,
    kind: BackendKind,
}

impl TestStore {
    /// Store on an attribute store returning at most `page_size` items per
    /// response.
    pub fn attribute_store(page_size: usize) -> Self {
        Self::attribute_store_with(page_size, Config::default())
    }

    /// Like [`attribute_store`](Self::attribute_store) with a custom config.
    pub fn attribute_store_with(page_size: usize, config: Config) -> Self {
        let service = Arc::new(InMemoryAttributeStore::with_page_size(page_size));
        for schema in sample_schemas() {
            service.create_domain(config.table_name(schema.table()));
        }
        let store = EntityStore::attribute_store(service, registry(), config)
            .expect("failed to create attribute store");
        Self {
            store,
            kind: BackendKind::AttributeStore,
        }
    }

    /// Store on a key/range store returning at most `page_size` items per
    /// response.
    pub fn key_range(page_size: usize) -> Self {
        Self::key_range_with(page_size, Config::default())
    }

    /// Like [`key_range`](Self::key_range) with a custom config.
    pub fn key_range_with(page_size: usize, config: Config) -> Self {
        let service = Arc::new(InMemoryKeyRangeStore::with_page_size(page_size));
        for schema in sample_schemas() {
            let hash = schema.id_field().attribute();
            let keys = match schema.range_field() {
                Some(range) => KeySchema::hash_range(hash, range.attribute()),
                None => KeySchema::hash(hash),
            };
            service.create_table(config.table_name(schema.table()), keys);
        }
        let store = EntityStore::key_range(service, registry(), config)
            .expect("failed to create key/range store");
        Self {
            store,
            kind: BackendKind::KeyRange,
        }
    }

    /// One store per backend.
    pub fn all(page_size: usize) -> [Self; 2] {
        [Self::attribute_store(page_size), Self::key_range(page_size)]
    }

    /// Which backend the store runs on.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl std::ops::Deref for TestStore {
    type Target = EntityStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

fn sample_schemas() -> [EntitySchema; 3] {
    [person_schema(), item_schema(), doc_schema()]
}

fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    for schema in sample_schemas() {
        registry
            .register(schema)
            .expect("sample schemas have distinct names");
    }
    Arc::new(registry)
}

/// Runs `f` once against each backend.
///
/// # Example
///
/// ```rust
/// use dualdb_testkit::{with_each_backend, PERSON};
///
/// with_each_backend(10, |store| {
///     assert_eq!(store.query(PERSON).unwrap().count().unwrap(), 0);
/// });
/// ```
pub fn with_each_backend<F>(page_size: usize, mut f: F)
where
    F: FnMut(&TestStore),
{
    init_tracing();
    for store in TestStore::all(page_size) {
        f(&store);
    }
}

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG`, so tests stay quiet by default.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_have_the_sample_schemas() {
        for store in TestStore::all(1) {
            let mut names = store.registry().names();
            names.sort();
            assert_eq!(names, vec![DOC, ITEM, PERSON]);
        }
    }

    #[test]
    fn table_prefix_is_applied() {
        let store = TestStore::key_range_with(10, Config::new().table_prefix("t_"));
        let mut abc = person("abc", 25);
        store.put(PERSON, &mut abc).unwrap();
        assert_eq!(store.get(PERSON, "abc").unwrap(), Some(abc));
    }

    #[test]
    fn person_model_round_trip() {
        let model = Person {
            name: "abc".into(),
            age: Some(25),
        };
        assert_eq!(Person::from_record(&model.to_record()).unwrap(), model);
    }
}
