//! Records and typed models.

use crate::error::{CoreError, CoreResult};
use crate::schema::EntitySchema;
use dualdb_codec::Value;
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

/// Field values of one entity, keyed by field name.
///
/// A missing field and a `Null` field are the same thing: setting a field
/// to `Null` removes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field and returns the record.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field. `Null` removes it.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        match value.into() {
            Value::Null => {
                self.fields.remove(&field);
            }
            value => {
                self.fields.insert(field, value);
            }
        }
    }

    /// Returns a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field, or `Null` if absent.
    pub fn value(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Returns a field, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing field.
    pub fn require(&self, field: &str) -> CoreResult<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| CoreError::validation(format!("missing field {field}")))
    }

    /// Removes a field and returns its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of non-null fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keeps only the listed fields.
    pub fn retain_fields(&mut self, fields: &[String]) {
        self.fields.retain(|name, _| fields.contains(name));
    }

    /// The identity (or hash) key value.
    pub fn id(&self, schema: &EntitySchema) -> &Value {
        self.value(schema.id_field().name())
    }

    /// The range key value, if the schema has one.
    pub fn range(&self, schema: &EntitySchema) -> Option<&Value> {
        schema.range_field().map(|f| self.value(f.name()))
    }

    /// Checks every field against the schema and coerces values to the
    /// declared field types.
    ///
    /// # Errors
    ///
    /// Returns a validation error for fields the schema does not declare,
    /// and a codec error for values that do not fit their field type.
    pub fn conform(&self, schema: &EntitySchema) -> CoreResult<Record> {
        let mut out = Record::new();
        for (name, value) in &self.fields {
            let field = schema.require_field(name)?;
            out.set(name.clone(), value.clone().coerce(field.field_type())?);
        }
        Ok(out)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.set(field, value);
        }
        record
    }
}

/// A typed struct stored through an [`EntityStore`](crate::EntityStore).
///
/// # Example
///
/// ```rust
/// use dualdb_codec::{FieldType, Value};
/// use dualdb_core::{CoreError, CoreResult, EntitySchema, Model, Record};
///
/// struct Person {
///     name: String,
///     age: i32,
/// }
///
/// impl Model for Person {
///     const ENTITY: &'static str = "person";
///
///     fn schema() -> CoreResult<EntitySchema> {
///         EntitySchema::builder(Self::ENTITY)
///             .identity("name", FieldType::String)
///             .field("age", FieldType::Int)
///             .build()
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new().with("name", self.name.as_str()).with("age", self.age)
///     }
///
///     fn from_record(record: &Record) -> CoreResult<Self> {
///         Ok(Self {
///             name: record.require("name")?.as_str().unwrap_or_default().to_string(),
///             age: match record.value("age") {
///                 Value::Int(n) => *n,
///                 _ => 0,
///             },
///         })
///     }
/// }
///
/// let person = Person { name: "abc".into(), age: 25 };
/// assert_eq!(Person::from_record(&person.to_record()).unwrap().age, 25);
/// ```
pub trait Model: Sized {
    /// Name the schema is registered under.
    const ENTITY: &'static str;

    /// Builds the schema for this type.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the declaration is invalid.
    fn schema() -> CoreResult<EntitySchema>;

    /// Converts the value to a record.
    fn to_record(&self) -> Record;

    /// Rebuilds the value from a record.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or mistyped.
    fn from_record(record: &Record) -> CoreResult<Self>;
}
