//! Attribute store translator.
//!
//! Records become items named by their storage key. A single identity key
//! lives only in the item name; composite keys are also kept as ordinary
//! attributes so they can be filtered on. Every value is stored in its
//! order-preserving string form, so the service's lexicographic comparisons
//! match the field order.

use super::{chunk_size, BackendKind, BackendTranslator, Expectation};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::filter::{Condition, Operator};
use crate::key::{key_of, parse_key, StorageKey};
use crate::query::{Direction, PaginationCursor, QueryPage, QuerySpec, SelectShape};
use crate::record::Record;
use crate::schema::{EntitySchema, FieldDescriptor, FieldRole};
use dualdb_codec::{decode, decode_set, encode, encode_set, FieldType, Value};
use dualdb_storage::select::{escape_like, quote_name, quote_value};
use dualdb_storage::{
    AttributeItem, AttributeStoreClient, BatchDeleteAttributesRequest, BatchPutAttributesRequest,
    DeleteAttributesRequest, GetAttributesRequest, PutAttributesRequest, ReplaceableAttribute,
    ReplaceableItem, SelectRequest, UpdateCondition, COUNT_ATTRIBUTE,
    COUNT_ITEM_NAME, MAX_BATCH_ITEMS,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const ITEM_NAME: &str = "itemName()";

/// Translator for the attribute store.
pub struct AttributeStoreBackend {
    client: Arc<dyn AttributeStoreClient>,
    config: Config,
}

impl fmt::Debug for AttributeStoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeStoreBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AttributeStoreBackend {
    /// Creates a translator over `client`.
    pub fn new(client: Arc<dyn AttributeStoreClient>, config: Config) -> Self {
        Self { client, config }
    }

    /// The configuration requests are built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn domain(&self, schema: &EntitySchema) -> String {
        self.config.table_name(schema.table())
    }

    /// Renders the select statement for one batch of a query.
    ///
    /// # Errors
    ///
    /// Returns a codec error if an operand does not encode.
    pub fn select_expression(&self, spec: &QuerySpec) -> CoreResult<String> {
        let mut text = format!(
            "select {} from {}",
            output_clause(spec),
            quote_name(&self.domain(&spec.schema))
        );
        push_where(&mut text, spec)?;

        if let Some(term) = spec.sort() {
            let field = spec.schema.require_field(&term.field)?;
            let direction = match term.direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            text.push_str(&format!(" order by {} {direction}", name_of(field)));
        }
        if let Some(limit) = spec.limit.or(self.config.default_page_size) {
            text.push_str(&format!(" limit {limit}"));
        }
        Ok(text)
    }

    /// Renders the `count(*)` statement for a query.
    ///
    /// # Errors
    ///
    /// Returns a codec error if an operand does not encode.
    pub fn count_expression(&self, spec: &QuerySpec) -> CoreResult<String> {
        let mut text = format!(
            "select count(*) from {}",
            quote_name(&self.domain(&spec.schema))
        );
        push_where(&mut text, spec)?;
        Ok(text)
    }

    fn write(
        &self,
        schema: &EntitySchema,
        record: &Record,
        expected: Option<UpdateCondition>,
    ) -> CoreResult<()> {
        let key = key_of(schema, record)?;
        let (attributes, nulls) = item_attributes(schema, record)?;
        if attributes.is_empty() {
            return Err(no_attributes(schema, &key));
        }

        let domain = self.domain(schema);
        debug!(
            domain = %domain,
            item = key.as_str(),
            attributes = attributes.len(),
            conditional = expected.is_some(),
            "put attributes"
        );
        self.client
            .put_attributes(&PutAttributesRequest {
                domain: domain.clone(),
                item_name: key.as_str().to_string(),
                attributes,
                expected,
            })
            .map_err(|e| CoreError::write(schema.name(), key.as_str(), "put attributes", e))?;

        self.remove_attributes(&domain, key.as_str(), nulls)
    }

    fn remove_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: Vec<String>,
    ) -> CoreResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        debug!(domain, item = item_name, attributes = ?names, "delete null attributes");
        self.client
            .delete_attributes(&DeleteAttributesRequest {
                domain: domain.to_string(),
                item_name: item_name.to_string(),
                attribute_names: names,
                expected: None,
            })
            .map_err(|e| CoreError::backend("delete attributes", e))
    }

    fn select(
        &self,
        expression: String,
        token: Option<String>,
        consistent: bool,
    ) -> CoreResult<(Vec<AttributeItem>, Option<String>)> {
        debug!(expression = %expression, token = ?token, consistent, "select");
        let response = self
            .client
            .select(&SelectRequest {
                select_expression: expression,
                next_token: token,
                consistent_read: consistent,
            })
            .map_err(|e| CoreError::backend("select", e))?;
        Ok((response.items, response.next_token))
    }
}

impl BackendTranslator for AttributeStoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::AttributeStore
    }

    fn put(&self, schema: &EntitySchema, record: &Record) -> CoreResult<()> {
        self.write(schema, record, None)
    }

    fn put_if(
        &self,
        schema: &EntitySchema,
        record: &Record,
        expected: &Expectation,
    ) -> CoreResult<()> {
        let field = schema.require_field(&expected.field)?;
        if field.role() == FieldRole::Identity {
            return Err(CoreError::validation(format!(
                "{} is stored as the item name and cannot be a write condition",
                field.name()
            )));
        }
        let value = match &expected.value {
            Some(value) => encode(value, field.field_type())?,
            None => None,
        };
        self.write(
            schema,
            record,
            Some(UpdateCondition {
                name: field.attribute().to_string(),
                value,
                exists: expected.exists,
            }),
        )
    }

    fn batch_put(&self, schema: &EntitySchema, records: &[Record]) -> CoreResult<()> {
        let domain = self.domain(schema);
        for chunk in records.chunks(chunk_size(&self.config, MAX_BATCH_ITEMS)) {
            let mut items = Vec::with_capacity(chunk.len());
            let mut nulls = Vec::with_capacity(chunk.len());
            for record in chunk {
                let key = key_of(schema, record)?;
                let (attributes, removed) = item_attributes(schema, record)?;
                if attributes.is_empty() {
                    return Err(no_attributes(schema, &key));
                }
                nulls.push((key.as_str().to_string(), removed));
                items.push(ReplaceableItem {
                    name: key.into_string(),
                    attributes,
                });
            }

            debug!(domain = %domain, items = items.len(), "batch put attributes");
            self.client
                .batch_put_attributes(&BatchPutAttributesRequest {
                    domain: domain.clone(),
                    items,
                })
                .map_err(|e| CoreError::backend("batch put attributes", e))?;

            for (item_name, names) in nulls {
                self.remove_attributes(&domain, &item_name, names)?;
            }
        }
        Ok(())
    }

    fn get(
        &self,
        schema: &EntitySchema,
        key: &StorageKey,
        consistent: bool,
    ) -> CoreResult<Option<Record>> {
        let domain = self.domain(schema);
        debug!(domain = %domain, item = key.as_str(), consistent, "get attributes");
        let item = self
            .client
            .get_attributes(&GetAttributesRequest {
                domain,
                item_name: key.as_str().to_string(),
                attribute_names: Vec::new(),
                consistent_read: consistent,
            })
            .map_err(|e| CoreError::backend("get attributes", e))?;

        item.map(|item| decode_item(schema, &item, SelectShape::All, &[]))
            .transpose()
    }

    fn delete(&self, schema: &EntitySchema, key: &StorageKey) -> CoreResult<()> {
        let domain = self.domain(schema);
        debug!(domain = %domain, item = key.as_str(), "delete attributes");
        self.client
            .delete_attributes(&DeleteAttributesRequest {
                domain,
                item_name: key.as_str().to_string(),
                attribute_names: Vec::new(),
                expected: None,
            })
            .map_err(|e| CoreError::backend("delete attributes", e))
    }

    fn batch_delete(&self, schema: &EntitySchema, keys: &[StorageKey]) -> CoreResult<()> {
        let domain = self.domain(schema);
        for chunk in keys.chunks(chunk_size(&self.config, MAX_BATCH_ITEMS)) {
            debug!(domain = %domain, items = chunk.len(), "batch delete attributes");
            self.client
                .batch_delete_attributes(&BatchDeleteAttributesRequest {
                    domain: domain.clone(),
                    item_names: chunk.iter().map(|k| k.as_str().to_string()).collect(),
                })
                .map_err(|e| CoreError::backend("batch delete attributes", e))?;
        }
        Ok(())
    }

    fn query_count(&self, spec: &QuerySpec) -> CoreResult<u64> {
        let expression = self.count_expression(spec)?;
        let mut total = 0u64;
        let mut token = None;
        loop {
            let (items, next) = self.select(expression.clone(), token, spec.consistent)?;
            for item in &items {
                total = total.saturating_add(parse_count(item)?);
            }
            match next {
                Some(next) => token = Some(next),
                None => return Ok(total),
            }
        }
    }

    fn query_run(
        &self,
        spec: &QuerySpec,
        cursor: Option<&PaginationCursor>,
    ) -> CoreResult<QueryPage> {
        let token = match cursor {
            None => None,
            Some(PaginationCursor::Token(token)) => Some(token.clone()),
            Some(other) => {
                return Err(CoreError::validation(format!(
                    "cursor {} was not issued by the attribute store",
                    other.describe()
                )))
            }
        };

        let expression = self.select_expression(spec)?;
        let (items, next) = self.select(expression, token, spec.consistent)?;
        let shape = spec.shape();
        let records = items
            .iter()
            .map(|item| decode_item(&spec.schema, item, shape, &spec.selected))
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(QueryPage {
            records,
            cursor: next.map(PaginationCursor::Token),
        })
    }
}

fn no_attributes(schema: &EntitySchema, key: &StorageKey) -> CoreError {
    CoreError::unsupported(format!(
        "{} {key} has no attributes besides its item name; the attribute store cannot hold it",
        schema.name()
    ))
}

/// Attribute writes for a record, plus the attributes whose field is null.
fn item_attributes(
    schema: &EntitySchema,
    record: &Record,
) -> CoreResult<(Vec<ReplaceableAttribute>, Vec<String>)> {
    let mut attributes = Vec::new();
    let mut nulls = Vec::new();

    for field in schema.fields() {
        if field.role() == FieldRole::Identity {
            continue;
        }
        let value = record.value(field.name());
        let texts = match field.field_type() {
            FieldType::Set(elem) => encode_set(value, elem)?,
            field_type => encode(value, field_type)?.into_iter().collect(),
        };
        if texts.is_empty() {
            nulls.push(field.attribute().to_string());
        }
        attributes.extend(
            texts
                .into_iter()
                .map(|text| ReplaceableAttribute::replace(field.attribute(), text)),
        );
    }
    Ok((attributes, nulls))
}

/// Decodes an item, rebuilding key fields the response left out.
fn decode_item(
    schema: &EntitySchema,
    item: &AttributeItem,
    shape: SelectShape,
    selected: &[String],
) -> CoreResult<Record> {
    let mut record = Record::new();
    for (attribute, values) in &item.attributes {
        let Some(field) = schema.field_by_attribute(attribute) else {
            warn!(
                entity = schema.name(),
                item = %item.name,
                attribute = %attribute,
                "skipping attribute with no matching field"
            );
            continue;
        };
        let value = match field.field_type() {
            FieldType::Set(elem) => decode_set(values, elem),
            field_type => decode(values.first().map(String::as_str), field_type),
        }
        .map_err(|e| {
            CoreError::invalid_response("decode item", format!("{}.{attribute}: {e}", item.name))
        })?;
        record.set(field.name(), value);
    }

    let id_field = schema.id_field().name();
    let range_field = schema.range_field().map(FieldDescriptor::name);
    let missing_id = shape.includes_id() && !record.contains(id_field);
    let missing_range =
        shape.includes_range() && range_field.is_some_and(|f| !record.contains(f));
    if missing_id || missing_range {
        let (id, range) = parse_key(schema, &StorageKey::from_raw(item.name.as_str()))?;
        if missing_id {
            record.set(id_field, id);
        }
        if let (Some(field), Some(range), true) = (range_field, range, missing_range) {
            record.set(field, range);
        }
    }

    if !selected.is_empty() {
        record.retain_fields(selected);
    }
    Ok(record)
}

fn parse_count(item: &AttributeItem) -> CoreResult<u64> {
    item.first(COUNT_ATTRIBUTE)
        .filter(|_| item.name == COUNT_ITEM_NAME)
        .and_then(|count| count.parse().ok())
        .ok_or_else(|| {
            CoreError::invalid_response(
                "select count",
                format!("item {} carries no numeric {COUNT_ATTRIBUTE}", item.name),
            )
        })
}

fn output_clause(spec: &QuerySpec) -> String {
    match spec.shape() {
        SelectShape::All => "*".to_string(),
        SelectShape::IdOnly => ITEM_NAME.to_string(),
        _ => {
            let names: Vec<String> = spec
                .selected
                .iter()
                .filter_map(|name| spec.schema.field(name))
                .filter(|field| field.role() != FieldRole::Identity)
                .map(|field| quote_name(field.attribute()))
                .collect();
            if names.is_empty() {
                ITEM_NAME.to_string()
            } else {
                names.join(", ")
            }
        }
    }
}

fn name_of(field: &FieldDescriptor) -> String {
    if field.role() == FieldRole::Identity {
        ITEM_NAME.to_string()
    } else {
        quote_name(field.attribute())
    }
}

fn push_where(text: &mut String, spec: &QuerySpec) -> CoreResult<()> {
    let mut predicates = spec
        .conditions
        .iter()
        .map(|c| predicate(&spec.schema, c))
        .collect::<CoreResult<Vec<_>>>()?;

    // The service only sorts on attributes the where clause constrains.
    if let Some(term) = spec.sort() {
        let field = spec.schema.require_field(&term.field)?;
        if field.role() != FieldRole::Identity && !spec.constrains(&term.field) {
            predicates.push(format!("{} is not null", name_of(field)));
        }
    }

    if !predicates.is_empty() {
        text.push_str(" where ");
        text.push_str(&predicates.join(" and "));
    }
    Ok(())
}

fn operand_text(field: &FieldDescriptor, value: &Value) -> CoreResult<String> {
    let field_type = field
        .field_type()
        .set_element()
        .map_or(field.field_type(), FieldType::from);
    encode(value, field_type)?
        .ok_or_else(|| CoreError::validation(format!("null operand on {}", field.name())))
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

/// Escape character for operands embedded in generated `like` patterns.
const LIKE_ESCAPE: char = '\\';

fn predicate(schema: &EntitySchema, condition: &Condition) -> CoreResult<String> {
    let field = schema.require_field(condition.field())?;
    let name = name_of(field);
    let quoted = |index: usize| -> CoreResult<String> {
        Ok(quote_value(&operand_text(field, operand(condition, index)?)?))
    };
    let pattern = |prefix: &str, suffix: &str| -> CoreResult<String> {
        let text = operand_text(field, operand(condition, 0)?)?;
        let escaped = escape_like(&text, LIKE_ESCAPE);
        let mut out = quote_value(&format!("{prefix}{escaped}{suffix}"));
        if escaped.len() != text.len() {
            out.push_str(" escape ");
            out.push_str(&quote_value(&LIKE_ESCAPE.to_string()));
        }
        Ok(out)
    };

    let text = match condition.operator() {
        Operator::IsNull => format!("{name} is null"),
        Operator::NotNull => format!("{name} is not null"),
        op @ (Operator::Eq
        | Operator::Ne
        | Operator::Le
        | Operator::Lt
        | Operator::Ge
        | Operator::Gt) => format!("{name} {op} {}", quoted(0)?),
        Operator::Like => format!("{name} like {}", quoted(0)?),
        Operator::NotLike => format!("{name} not like {}", quoted(0)?),
        Operator::Contains if field.field_type().is_set() => format!("{name} = {}", quoted(0)?),
        Operator::Contains => format!("{name} like {}", pattern("%", "%")?),
        Operator::NotContains => format!("{name} not like {}", pattern("%", "%")?),
        Operator::BeginsWith => format!("{name} like {}", pattern("", "%")?),
        Operator::Between => format!("{name} between {} and {}", quoted(0)?, quoted(1)?),
        Operator::In => {
            let values = (0..condition.operands().len())
                .map(&quoted)
                .collect::<CoreResult<Vec<_>>>()?;
            format!("{name} in ({})", values.join(", "))
        }
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::query::SortTerm;
    use dualdb_codec::ScalarType;
    use dualdb_storage::InMemoryAttributeStore;

    fn person() -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::builder("person")
                .identity("name", FieldType::String)
                .field("age", FieldType::Int)
                .field("tags", FieldType::Set(ScalarType::String))
                .build()
                .unwrap(),
        )
    }

    fn item() -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::builder("item")
                .hash_key("id", FieldType::Long)
                .range_key("name", FieldType::String)
                .field("count", FieldType::Int)
                .build()
                .unwrap(),
        )
    }

    fn backend() -> (Arc<InMemoryAttributeStore>, AttributeStoreBackend) {
        let store = Arc::new(InMemoryAttributeStore::new());
        store.create_domain("person");
        store.create_domain("item");
        let backend = AttributeStoreBackend::new(store.clone(), Config::default());
        (store, backend)
    }

    fn cond(schema: &EntitySchema, field: &str, op: Operator, operands: Vec<Value>) -> Condition {
        Condition::new(schema, BackendKind::AttributeStore, field, op, operands).unwrap()
    }

    fn abc() -> Record {
        Record::new()
            .with("name", "abc")
            .with("age", 25)
            .with("tags", vec!["red", "blue"])
    }

    #[test]
    fn renders_where_order_and_limit() {
        let (_, backend) = backend();
        let schema = person();
        let mut spec = QuerySpec::new(schema.clone());
        spec.conditions
            .push(cond(&schema, "age", Operator::Gt, vec![25.into()]));
        spec.order.push(SortTerm {
            field: "age".to_string(),
            direction: Direction::Descending,
        });
        spec.limit = Some(10);

        assert_eq!(
            backend.select_expression(&spec).unwrap(),
            "select * from `person` where `age` > '0000000025' order by `age` desc limit 10"
        );
        assert_eq!(
            backend.count_expression(&spec).unwrap(),
            "select count(*) from `person` where `age` > '0000000025'"
        );
    }

    #[test]
    fn unconstrained_sort_field_gets_not_null() {
        let (_, backend) = backend();
        let mut spec = QuerySpec::new(person());
        spec.order.push(SortTerm {
            field: "age".to_string(),
            direction: Direction::Ascending,
        });
        assert_eq!(
            backend.select_expression(&spec).unwrap(),
            "select * from `person` where `age` is not null order by `age` asc"
        );
    }

    #[test]
    fn identity_key_uses_item_name() {
        let (_, backend) = backend();
        let schema = person();

        let mut spec = QuerySpec::new(schema.clone());
        spec.selected = vec!["name".to_string()];
        spec.conditions
            .push(cond(&schema, "name", Operator::BeginsWith, vec!["a".into()]));
        assert_eq!(
            backend.select_expression(&spec).unwrap(),
            "select itemName() from `person` where itemName() like 'a%'"
        );

        spec.selected = vec!["name".to_string(), "age".to_string()];
        assert_eq!(spec.shape(), SelectShape::IdAndOthers);
        assert_eq!(
            backend.select_expression(&spec).unwrap(),
            "select `age` from `person` where itemName() like 'a%'"
        );
    }

    #[test]
    fn contains_renders_per_field_kind() {
        let schema = person();
        let on_tags = cond(&schema, "tags", Operator::Contains, vec!["red".into()]);
        let on_name = cond(&schema, "name", Operator::Contains, vec!["b".into()]);
        let not_on_name = cond(&schema, "name", Operator::NotContains, vec!["b".into()]);
        let within = cond(&schema, "age", Operator::Between, vec![1.into(), 9.into()]);
        let among = cond(&schema, "age", Operator::In, vec![1.into(), 2.into()]);

        assert_eq!(predicate(&schema, &on_tags).unwrap(), "`tags` = 'red'");
        assert_eq!(predicate(&schema, &on_name).unwrap(), "itemName() like '%b%'");
        assert_eq!(
            predicate(&schema, &not_on_name).unwrap(),
            "itemName() not like '%b%'"
        );
        assert_eq!(
            predicate(&schema, &within).unwrap(),
            "`age` between '0000000001' and '0000000009'"
        );
        assert_eq!(
            predicate(&schema, &among).unwrap(),
            "`age` in ('0000000001', '0000000002')"
        );
    }

    #[test]
    fn pattern_operands_escape_wildcards() {
        let schema = person();
        let prefix = cond(&schema, "name", Operator::BeginsWith, vec!["50%".into()]);
        let infix = cond(&schema, "name", Operator::Contains, vec!["a_\\".into()]);
        let raw = cond(&schema, "name", Operator::Like, vec!["50%".into()]);

        assert_eq!(
            predicate(&schema, &prefix).unwrap(),
            "itemName() like '50\\%%' escape '\\'"
        );
        assert_eq!(
            predicate(&schema, &infix).unwrap(),
            "itemName() like '%a\\_\\\\%' escape '\\'"
        );
        assert_eq!(predicate(&schema, &raw).unwrap(), "itemName() like '50%'");
    }

    #[test]
    fn wildcard_operands_match_literally() {
        let (_, backend) = backend();
        let schema = person();
        for name in ["50abc", "50%x", "a_c", "abc"] {
            backend
                .put(&schema, &Record::new().with("name", name).with("age", 1))
                .unwrap();
        }
        let count = |op: Operator, operand: &str| {
            let mut spec = QuerySpec::new(schema.clone());
            spec.conditions.push(cond(&schema, "name", op, vec![operand.into()]));
            backend.query_count(&spec).unwrap()
        };

        assert_eq!(count(Operator::BeginsWith, "50%"), 1);
        assert_eq!(count(Operator::Contains, "_"), 1);
        assert_eq!(count(Operator::NotContains, "_"), 3);
    }

    #[test]
    fn put_get_and_null_removal() {
        let (store, backend) = backend();
        let schema = person();
        let key = key_of(&schema, &abc()).unwrap();

        backend.put(&schema, &abc()).unwrap();
        let stored = store.item("person", "abc").unwrap();
        assert_eq!(stored.values("tags").len(), 2);
        assert!(stored.first("name").is_none());

        let found = backend.get(&schema, &key, true).unwrap().unwrap();
        assert_eq!(found, abc());

        let mut younger = abc();
        younger.set("age", 26);
        younger.remove("tags");
        backend.put(&schema, &younger).unwrap();
        assert!(store.item("person", "abc").unwrap().first("tags").is_none());
        assert_eq!(backend.get(&schema, &key, true).unwrap(), Some(younger));

        backend.delete(&schema, &key).unwrap();
        assert_eq!(backend.get(&schema, &key, true).unwrap(), None);
    }

    #[test]
    fn composite_keys_are_stored_as_attributes() {
        let (store, backend) = backend();
        let schema = item();
        let record = Record::new()
            .with("id", 31i64)
            .with("name", "item31")
            .with("count", 2);
        backend.put(&schema, &record).unwrap();

        let stored = store
            .item("item", "19:0000000000000000031/item31")
            .unwrap();
        assert_eq!(stored.first("id"), Some("0000000000000000031"));
        assert_eq!(stored.first("name"), Some("item31"));
    }

    #[test]
    fn selected_keys_are_back_filled() {
        let (_, backend) = backend();
        let schema = item();
        for n in 1..=3i64 {
            let record = Record::new()
                .with("id", 31i64)
                .with("name", format!("item{n}"))
                .with("count", n);
            backend.put(&schema, &record).unwrap();
        }

        let mut spec = QuerySpec::new(schema);
        spec.selected = vec!["id".to_string()];
        let page = backend.query_run(&spec, None).unwrap();
        assert_eq!(page.records.len(), 3);
        for record in &page.records {
            assert_eq!(record.len(), 1);
            assert_eq!(record.value("id"), &Value::Long(31));
        }
    }

    #[test]
    fn counts_matching_items() {
        let (_, backend) = backend();
        let schema = person();
        for (name, age) in [("a", 20), ("b", 30), ("c", 40)] {
            let record = Record::new().with("name", name).with("age", age);
            backend.put(&schema, &record).unwrap();
        }
        let mut spec = QuerySpec::new(schema.clone());
        spec.conditions
            .push(cond(&schema, "age", Operator::Ge, vec![30.into()]));
        assert_eq!(backend.query_count(&spec).unwrap(), 2);
    }

    #[test]
    fn unknown_attributes_are_skipped() {
        let (store, backend) = backend();
        let schema = person();
        backend.put(&schema, &abc()).unwrap();
        store
            .put_attributes(&PutAttributesRequest {
                domain: "person".to_string(),
                item_name: "abc".to_string(),
                attributes: vec![ReplaceableAttribute::replace("legacy", "x")],
                expected: None,
            })
            .unwrap();

        let key = StorageKey::from_raw("abc");
        assert_eq!(backend.get(&schema, &key, true).unwrap(), Some(abc()));
    }

    #[test]
    fn undecodable_stored_values_are_backend_errors() {
        let (store, backend) = backend();
        let schema = person();
        store
            .put_attributes(&PutAttributesRequest {
                domain: "person".to_string(),
                item_name: "abc".to_string(),
                attributes: vec![ReplaceableAttribute::replace("age", "x")],
                expected: None,
            })
            .unwrap();

        let err = backend
            .get(&schema, &StorageKey::from_raw("abc"), true)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Backend);

        let err = backend.query_run(&QuerySpec::new(schema), None).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Backend);
    }

    #[test]
    fn unstorable_records_and_conditions() {
        let (_, backend) = backend();
        let schema = person();
        assert!(matches!(
            backend.put(&schema, &Record::new().with("name", "abc")),
            Err(CoreError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            backend.put_if(&schema, &abc(), &Expectation::absent("name")),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn conditional_put() {
        let (_, backend) = backend();
        let schema = person();
        backend
            .put_if(&schema, &abc(), &Expectation::absent("age"))
            .unwrap();
        assert!(matches!(
            backend.put_if(&schema, &abc(), &Expectation::absent("age")),
            Err(CoreError::OptimisticLockConflict { .. })
        ));
        backend
            .put_if(&schema, &abc(), &Expectation::equals("age", 25))
            .unwrap();
    }

    #[test]
    fn foreign_cursor_is_rejected() {
        let (_, backend) = backend();
        let spec = QuerySpec::new(person());
        let cursor = PaginationCursor::Key(Default::default());
        assert!(matches!(
            backend.query_run(&spec, Some(&cursor)),
            Err(CoreError::Validation { .. })
        ));
    }
}
