//! Key/range store translator.
//!
//! Reads go out as a *query* when the filters pin the hash key with an
//! equality and leave at most one query-legal condition on the range key;
//! anything else is a *scan*. Only queries can be ordered, and only by the
//! range key.

use super::{chunk_size, BackendKind, BackendTranslator, Expectation};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::filter::{Condition, Operator};
use crate::key::{key_of, parse_key, StorageKey};
use crate::query::{Direction, PaginationCursor, QueryPage, QuerySpec};
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDescriptor};
use dualdb_codec::{
    decode, decode_set, encode, encode_set, number_text, parse_number, CodecError, CodecResult,
    FieldType, ScalarType, Value,
};
use dualdb_storage::{
    AttributeCondition, AttributeValue, BatchWriteItemRequest, ComparisonOperator,
    Condition as NativeCondition, DeleteItemRequest, ExpectedAttribute, GetItemRequest, Item,
    KeyRangeClient, PutItemRequest, QueryOutput, QueryRequest, ScanRequest, WriteRequest,
    MAX_BATCH_WRITES,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a query is dispatched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Route<'a> {
    /// Key query on one hash value.
    Query {
        /// Equality on the hash key.
        hash: &'a Condition,
        /// Optional range key condition.
        range: Option<&'a Condition>,
    },
    /// Filtered full-table scan.
    Scan,
}

/// Decides between query and scan.
pub fn route(spec: &QuerySpec) -> Route<'_> {
    let schema = &spec.schema;
    let hash_field = schema.id_field().name();
    let Some(hash_at) = spec
        .conditions
        .iter()
        .position(|c| c.field() == hash_field && c.operator() == Operator::Eq)
    else {
        return Route::Scan;
    };

    let hash = &spec.conditions[hash_at];
    let rest: Vec<&Condition> = spec
        .conditions
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != hash_at)
        .map(|(_, c)| c)
        .collect();

    match rest.as_slice() {
        [] => Route::Query { hash, range: None },
        [range] if is_range_condition(schema, range) => Route::Query {
            hash,
            range: Some(*range),
        },
        _ => Route::Scan,
    }
}

fn is_range_condition(schema: &EntitySchema, condition: &Condition) -> bool {
    schema
        .range_field()
        .is_some_and(|f| f.name() == condition.field())
        && native_operator(condition.operator())
            .is_some_and(ComparisonOperator::is_key_condition)
}

fn native_operator(operator: Operator) -> Option<ComparisonOperator> {
    let native = match operator {
        Operator::IsNull => ComparisonOperator::Null,
        Operator::NotNull => ComparisonOperator::NotNull,
        Operator::Eq => ComparisonOperator::Eq,
        Operator::Ne => ComparisonOperator::Ne,
        Operator::Le => ComparisonOperator::Le,
        Operator::Lt => ComparisonOperator::Lt,
        Operator::Ge => ComparisonOperator::Ge,
        Operator::Gt => ComparisonOperator::Gt,
        Operator::Contains => ComparisonOperator::Contains,
        Operator::NotContains => ComparisonOperator::NotContains,
        Operator::BeginsWith => ComparisonOperator::BeginsWith,
        Operator::Between => ComparisonOperator::Between,
        Operator::In => ComparisonOperator::In,
        Operator::Like | Operator::NotLike => return None,
    };
    Some(native)
}

/// Translator for the key/range store.
pub struct KeyRangeBackend {
    client: Arc<dyn KeyRangeClient>,
    config: Config,
}

impl fmt::Debug for KeyRangeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRangeBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KeyRangeBackend {
    /// Creates a translator over `client`.
    pub fn new(client: Arc<dyn KeyRangeClient>, config: Config) -> Self {
        Self { client, config }
    }

    /// The configuration requests are built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn table(&self, schema: &EntitySchema) -> String {
        self.config.table_name(schema.table())
    }

    fn write(
        &self,
        schema: &EntitySchema,
        record: &Record,
        expected: BTreeMap<String, ExpectedAttribute>,
    ) -> CoreResult<()> {
        let key = key_of(schema, record)?;
        let item = to_item(schema, record)?;
        let table = self.table(schema);
        debug!(
            table = %table,
            key = key.as_str(),
            attributes = item.len(),
            conditional = !expected.is_empty(),
            "put item"
        );
        self.client
            .put_item(&PutItemRequest {
                table,
                item,
                expected,
            })
            .map_err(|e| CoreError::write(schema.name(), key.as_str(), "put item", e))
    }

    fn batch_write(&self, schema: &EntitySchema, writes: Vec<WriteRequest>) -> CoreResult<()> {
        let table = self.table(schema);
        let size = chunk_size(&self.config, MAX_BATCH_WRITES);
        for chunk in writes.chunks(size) {
            debug!(table = %table, writes = chunk.len(), "batch write item");
            self.client
                .batch_write_item(&BatchWriteItemRequest {
                    table: table.clone(),
                    writes: chunk.to_vec(),
                })
                .map_err(|e| CoreError::backend("batch write item", e))?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        spec: &QuerySpec,
        start: Option<Item>,
        count_only: bool,
    ) -> CoreResult<QueryOutput> {
        let schema = &spec.schema;
        let table = self.table(schema);
        let limit = if count_only {
            None
        } else {
            spec.limit.or(self.config.default_page_size)
        };

        match route(spec) {
            Route::Query { hash, range } => {
                let hash_field = schema.id_field();
                let hash_value = operand_attribute(hash_field, operand(hash, 0)?)?;
                let range_condition = range
                    .map(|c| attribute_condition(schema, c))
                    .transpose()?;
                let forward = spec
                    .sort()
                    .map_or(true, |term| term.direction == Direction::Ascending);
                debug!(
                    table = %table,
                    hash = %hash_value,
                    range = ?range_condition,
                    forward,
                    limit = ?limit,
                    count_only,
                    "query"
                );
                self.client
                    .query(&QueryRequest {
                        table,
                        hash_key: hash_field.attribute().to_string(),
                        hash_value,
                        range_condition,
                        attributes_to_get: attributes_to_get(spec),
                        limit,
                        scan_index_forward: forward,
                        exclusive_start_key: start,
                        consistent_read: spec.consistent,
                        count_only,
                    })
                    .map_err(|e| CoreError::backend("query", e))
            }
            Route::Scan => {
                if let Some(term) = spec.sort() {
                    return Err(CoreError::OrderByRequiresQuery {
                        entity: schema.name().to_string(),
                        field: term.field.clone(),
                    });
                }
                let scan_filter = spec
                    .conditions
                    .iter()
                    .map(|c| attribute_condition(schema, c))
                    .collect::<CoreResult<Vec<_>>>()?;
                debug!(
                    table = %table,
                    filters = scan_filter.len(),
                    limit = ?limit,
                    count_only,
                    "scan"
                );
                self.client
                    .scan(&ScanRequest {
                        table,
                        scan_filter,
                        attributes_to_get: attributes_to_get(spec),
                        limit,
                        exclusive_start_key: start,
                        consistent_read: spec.consistent,
                        count_only,
                    })
                    .map_err(|e| CoreError::backend("scan", e))
            }
        }
    }
}

impl BackendTranslator for KeyRangeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyRange
    }

    fn put(&self, schema: &EntitySchema, record: &Record) -> CoreResult<()> {
        self.write(schema, record, BTreeMap::new())
    }

    fn put_if(
        &self,
        schema: &EntitySchema,
        record: &Record,
        expected: &Expectation,
    ) -> CoreResult<()> {
        let field = schema.require_field(&expected.field)?;
        let value = match &expected.value {
            Some(value) => to_attribute(field, value)?,
            None => None,
        };
        let mut conditions = BTreeMap::new();
        conditions.insert(
            field.attribute().to_string(),
            ExpectedAttribute {
                value,
                exists: expected.exists,
            },
        );
        self.write(schema, record, conditions)
    }

    fn batch_put(&self, schema: &EntitySchema, records: &[Record]) -> CoreResult<()> {
        let writes = records
            .iter()
            .map(|record| {
                key_of(schema, record)?;
                to_item(schema, record).map(WriteRequest::Put)
            })
            .collect::<CoreResult<Vec<_>>>()?;
        self.batch_write(schema, writes)
    }

    fn get(
        &self,
        schema: &EntitySchema,
        key: &StorageKey,
        consistent: bool,
    ) -> CoreResult<Option<Record>> {
        let table = self.table(schema);
        debug!(table = %table, key = key.as_str(), consistent, "get item");
        let item = self
            .client
            .get_item(&GetItemRequest {
                table,
                key: key_item(schema, key)?,
                attributes_to_get: Vec::new(),
                consistent_read: consistent,
            })
            .map_err(|e| CoreError::backend("get item", e))?;

        item.map(|item| from_item(schema, &item)).transpose()
    }

    fn delete(&self, schema: &EntitySchema, key: &StorageKey) -> CoreResult<()> {
        let table = self.table(schema);
        debug!(table = %table, key = key.as_str(), "delete item");
        self.client
            .delete_item(&DeleteItemRequest {
                table,
                key: key_item(schema, key)?,
            })
            .map_err(|e| CoreError::backend("delete item", e))
    }

    fn batch_delete(&self, schema: &EntitySchema, keys: &[StorageKey]) -> CoreResult<()> {
        let writes = keys
            .iter()
            .map(|key| key_item(schema, key).map(WriteRequest::Delete))
            .collect::<CoreResult<Vec<_>>>()?;
        self.batch_write(schema, writes)
    }

    fn query_count(&self, spec: &QuerySpec) -> CoreResult<u64> {
        let mut total = 0u64;
        let mut start = None;
        loop {
            let output = self.dispatch(spec, start, true)?;
            total = total.saturating_add(output.count as u64);
            match output.last_evaluated_key {
                Some(key) => start = Some(key),
                None => return Ok(total),
            }
        }
    }

    fn query_run(
        &self,
        spec: &QuerySpec,
        cursor: Option<&PaginationCursor>,
    ) -> CoreResult<QueryPage> {
        let start = match cursor {
            None => None,
            Some(PaginationCursor::Key(key)) => Some(key.clone()),
            Some(other) => {
                return Err(CoreError::validation(format!(
                    "cursor {} was not issued by the key/range store",
                    other.describe()
                )))
            }
        };

        let output = self.dispatch(spec, start, false)?;
        let records = output
            .items
            .iter()
            .map(|item| from_item(&spec.schema, item))
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(QueryPage {
            records,
            cursor: output.last_evaluated_key.map(PaginationCursor::Key),
        })
    }
}

/// Selected attributes plus the key attributes, which are always fetched so
/// results stay addressable.
fn attributes_to_get(spec: &QuerySpec) -> Vec<String> {
    if spec.selected.is_empty() {
        return Vec::new();
    }

    let schema = &spec.schema;
    let keys = std::iter::once(schema.id_field()).chain(schema.range_field());
    let mut attributes: Vec<String> = Vec::new();
    for field in spec
        .selected
        .iter()
        .filter_map(|name| schema.field(name))
        .chain(keys)
    {
        if !attributes.iter().any(|a| a == field.attribute()) {
            attributes.push(field.attribute().to_string());
        }
    }
    attributes
}

fn operand(condition: &Condition, index: usize) -> CoreResult<&Value> {
    condition.operands().get(index).ok_or_else(|| {
        CoreError::validation(format!(
            "'{}' on {} is missing operand {index}",
            condition.operator(),
            condition.field()
        ))
    })
}

fn attribute_condition(
    schema: &EntitySchema,
    condition: &Condition,
) -> CoreResult<AttributeCondition> {
    let field = schema.require_field(condition.field())?;
    let operator = native_operator(condition.operator()).ok_or_else(|| {
        CoreError::unsupported(format!(
            "key/range backend does not support '{}'",
            condition.operator()
        ))
    })?;
    let values = condition
        .operands()
        .iter()
        .map(|value| operand_attribute(field, value))
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(AttributeCondition {
        attribute: field.attribute().to_string(),
        condition: NativeCondition::new(operator, values),
    })
}

/// Converts a condition operand. Set fields compare against single
/// elements.
fn operand_attribute(field: &FieldDescriptor, value: &Value) -> CoreResult<AttributeValue> {
    let field_type = field
        .field_type()
        .set_element()
        .map_or(field.field_type(), FieldType::from);
    if field_type.is_numeric() {
        return Ok(AttributeValue::N(number_text(
            &value.clone().coerce(field_type)?,
        )?));
    }
    encode(value, field_type)?
        .map(AttributeValue::S)
        .ok_or_else(|| CoreError::validation(format!("null operand on {}", field.name())))
}

fn non_empty(texts: Vec<String>) -> Option<Vec<String>> {
    (!texts.is_empty()).then_some(texts)
}

/// Converts a field value to its native attribute. Null and empty sets
/// have no attribute.
fn to_attribute(field: &FieldDescriptor, value: &Value) -> CoreResult<Option<AttributeValue>> {
    if value.is_null() {
        return Ok(None);
    }

    let field_type = field.field_type();
    let attribute = match field_type {
        FieldType::Set(elem) if elem.is_numeric() => {
            let coerced = value.clone().coerce(field_type)?;
            let texts = coerced
                .as_set()
                .unwrap_or_default()
                .iter()
                .filter(|v| !v.is_null())
                .map(number_text)
                .collect::<CodecResult<Vec<_>>>()?;
            non_empty(texts).map(AttributeValue::NS)
        }
        FieldType::Set(elem @ (ScalarType::String | ScalarType::Char)) => {
            non_empty(encode_set(value, elem)?).map(AttributeValue::SS)
        }
        FieldType::Set(_) => {
            let coerced = value.clone().coerce(field_type)?;
            if coerced.as_set().map_or(true, <[Value]>::is_empty) {
                None
            } else {
                encode(&coerced, field_type)?.map(AttributeValue::S)
            }
        }
        numeric if numeric.is_numeric() => Some(AttributeValue::N(number_text(
            &value.clone().coerce(numeric)?,
        )?)),
        other => encode(value, other)?.map(AttributeValue::S),
    };
    Ok(attribute)
}

fn from_attribute(field: &FieldDescriptor, attribute: &AttributeValue) -> CodecResult<Value> {
    let field_type = field.field_type();
    let value = match (field_type, attribute) {
        (FieldType::Set(elem), AttributeValue::SS(values)) => decode_set(values, elem)?,
        (FieldType::Set(elem), AttributeValue::NS(values)) => Value::Set(
            values
                .iter()
                .map(|v| parse_number(v, elem.into()))
                .collect::<CodecResult<Vec<_>>>()?,
        ),
        (numeric, AttributeValue::N(text)) if numeric.is_numeric() => {
            parse_number(text, numeric)?
        }
        (other, AttributeValue::S(text)) => decode(Some(text.as_str()), other)?,
        (other, attribute) => {
            return Err(CodecError::type_mismatch(other, attribute.to_string()));
        }
    };
    Ok(value)
}

fn to_item(schema: &EntitySchema, record: &Record) -> CoreResult<Item> {
    let mut item = Item::new();
    for field in schema.fields() {
        if let Some(attribute) = to_attribute(field, record.value(field.name()))? {
            item.insert(field.attribute().to_string(), attribute);
        }
    }
    Ok(item)
}

fn from_item(schema: &EntitySchema, item: &Item) -> CoreResult<Record> {
    let mut record = Record::new();
    for (name, attribute) in item {
        let Some(field) = schema.field_by_attribute(name) else {
            warn!(
                entity = schema.name(),
                attribute = %name,
                "skipping attribute with no matching field"
            );
            continue;
        };
        let value = from_attribute(field, attribute)
            .map_err(|e| CoreError::invalid_response("decode item", format!("{name}: {e}")))?;
        record.set(field.name(), value);
    }
    Ok(record)
}

fn key_item(schema: &EntitySchema, key: &StorageKey) -> CoreResult<Item> {
    let (id, range) = parse_key(schema, key)?;
    let mut item = Item::new();
    let fields = std::iter::once((schema.id_field(), Some(id)))
        .chain(schema.range_field().map(|field| (field, range)));
    for (field, value) in fields {
        let attribute = value
            .map(|v| to_attribute(field, &v))
            .transpose()?
            .flatten()
            .ok_or_else(|| {
                CoreError::malformed_key(key.as_str(), format!("{} decodes to null", field.name()))
            })?;
        item.insert(field.attribute().to_string(), attribute);
    }
    Ok(item)
}
