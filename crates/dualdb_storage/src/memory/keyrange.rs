//! In-memory key/range store.

use crate::error::{StorageError, StorageResult};
use crate::keyrange::{
    AttributeCondition, AttributeValue, BatchWriteItemRequest, ComparisonOperator, Condition,
    DeleteItemRequest, ExpectedAttribute, GetItemRequest, Item, KeyRangeClient, KeySchema,
    PutItemRequest, QueryOutput, QueryRequest, ScanRequest, WriteRequest, MAX_BATCH_WRITES,
};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

type TableKey = (String, String);

#[derive(Debug)]
struct Table {
    schema: KeySchema,
    items: BTreeMap<TableKey, Item>,
}

impl Table {
    fn key(&self, item: &Item) -> StorageResult<TableKey> {
        let part = |name: &str| {
            item.get(name)
                .and_then(AttributeValue::scalar_text)
                .map(str::to_string)
                .ok_or_else(|| {
                    StorageError::invalid_request(format!("missing key attribute {name}"))
                })
        };
        let hash = part(&self.schema.hash_key)?;
        let range = match &self.schema.range_key {
            Some(range_key) => part(range_key)?,
            None => String::new(),
        };
        Ok((hash, range))
    }
}

/// A key/range store held in memory.
///
/// Tables must be created with [`InMemoryKeyRangeStore::create_table`]
/// before use. `page_size` caps the items evaluated per query or scan page
/// so that `last_evaluated_key` handling can be exercised with small data
/// sets.
#[derive(Debug)]
pub struct InMemoryKeyRangeStore {
    tables: RwLock<BTreeMap<String, Table>>,
    page_size: usize,
}

impl Default for InMemoryKeyRangeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKeyRangeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(usize::MAX)
    }

    /// Creates an empty store returning at most `page_size` items per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Creates a table. An existing table keeps its items and schema.
    pub fn create_table(&self, name: impl Into<String>, schema: KeySchema) {
        self.tables.write().entry(name.into()).or_insert(Table {
            schema,
            items: BTreeMap::new(),
        });
    }

    /// Returns the number of items in a table.
    #[must_use]
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.items.len())
    }

    fn page(
        &self,
        schema: &KeySchema,
        candidates: &[&Item],
        limit: Option<usize>,
        attributes_to_get: &[String],
        count_only: bool,
    ) -> QueryOutput {
        let size = limit.unwrap_or(usize::MAX).min(self.page_size).max(1);
        let taken = &candidates[..size.min(candidates.len())];
        let last_evaluated_key = if candidates.len() > taken.len() {
            taken.last().and_then(|item| schema.key_of(item))
        } else {
            None
        };

        QueryOutput {
            items: if count_only {
                Vec::new()
            } else {
                taken
                    .iter()
                    .map(|item| project(item, attributes_to_get))
                    .collect()
            },
            count: taken.len(),
            last_evaluated_key,
        }
    }
}

fn table_not_found(name: &str) -> StorageError {
    StorageError::NoSuchTable(name.to_string())
}

fn project(item: &Item, attributes_to_get: &[String]) -> Item {
    if attributes_to_get.is_empty() {
        return item.clone();
    }
    item.iter()
        .filter(|(name, _)| attributes_to_get.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn equals(actual: &AttributeValue, expected: &AttributeValue) -> bool {
    actual.compare(expected) == Some(Ordering::Equal) || actual == expected
}

fn contains(actual: &AttributeValue, needle: &AttributeValue) -> bool {
    match (actual, needle) {
        (AttributeValue::S(text), AttributeValue::S(part)) => text.contains(part.as_str()),
        (AttributeValue::SS(set), AttributeValue::S(value)) => set.contains(value),
        (AttributeValue::NS(set), AttributeValue::N(value)) => set
            .iter()
            .any(|n| equals(&AttributeValue::N(n.clone()), &AttributeValue::N(value.clone()))),
        _ => false,
    }
}

/// Evaluates a condition against an attribute that may be absent.
///
/// Every operator except `NULL` is false on an absent attribute.
pub fn condition_holds(actual: Option<&AttributeValue>, condition: &Condition) -> bool {
    let Some(actual) = actual else {
        return condition.operator == ComparisonOperator::Null;
    };
    let operand = |i: usize| condition.values.get(i);
    let ordered = |pred: fn(Ordering) -> bool| {
        operand(0)
            .and_then(|v| actual.compare(v))
            .map_or(false, pred)
    };

    match condition.operator {
        ComparisonOperator::Null => false,
        ComparisonOperator::NotNull => true,
        ComparisonOperator::Eq => operand(0).map_or(false, |v| equals(actual, v)),
        ComparisonOperator::Ne => operand(0).map_or(false, |v| !equals(actual, v)),
        ComparisonOperator::Lt => ordered(|o| o == Ordering::Less),
        ComparisonOperator::Le => ordered(|o| o != Ordering::Greater),
        ComparisonOperator::Gt => ordered(|o| o == Ordering::Greater),
        ComparisonOperator::Ge => ordered(|o| o != Ordering::Less),
        ComparisonOperator::Contains => operand(0).map_or(false, |v| contains(actual, v)),
        ComparisonOperator::NotContains => operand(0).map_or(false, |v| !contains(actual, v)),
        ComparisonOperator::BeginsWith => match (actual, operand(0)) {
            (AttributeValue::S(text), Some(AttributeValue::S(prefix))) => {
                text.starts_with(prefix.as_str())
            }
            _ => false,
        },
        ComparisonOperator::In => condition.values.iter().any(|v| equals(actual, v)),
        ComparisonOperator::Between => match (operand(0), operand(1)) {
            (Some(low), Some(high)) => {
                actual.compare(low).map_or(false, |o| o != Ordering::Less)
                    && actual.compare(high).map_or(false, |o| o != Ordering::Greater)
            }
            _ => false,
        },
    }
}

fn check_expected(
    table: &str,
    key: &TableKey,
    current: Option<&Item>,
    expected: &BTreeMap<String, ExpectedAttribute>,
) -> StorageResult<()> {
    for (name, expectation) in expected {
        let value = current.and_then(|item| item.get(name));
        let holds = match (expectation.exists, value, &expectation.value) {
            (false, None, _) => true,
            (false, Some(_), _) | (true, None, _) => false,
            (true, Some(_), None) => true,
            (true, Some(actual), Some(wanted)) => equals(actual, wanted),
        };
        if !holds {
            return Err(StorageError::conditional_check_failed(
                table,
                format!("{}/{}", key.0, key.1),
                format!(
                    "expected {name} {}, found {}",
                    match &expectation.value {
                        Some(v) if expectation.exists => v.to_string(),
                        _ if expectation.exists => "present".to_string(),
                        _ => "absent".to_string(),
                    },
                    value.map_or_else(|| "nothing".to_string(), ToString::to_string)
                ),
            ));
        }
    }
    Ok(())
}

impl KeyRangeClient for InMemoryKeyRangeStore {
    fn describe_table(&self, table: &str) -> StorageResult<KeySchema> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| table_not_found(table))
    }

    fn put_item(&self, request: &PutItemRequest) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;

        let key = table.key(&request.item)?;
        check_expected(
            &request.table,
            &key,
            table.items.get(&key),
            &request.expected,
        )?;
        table.items.insert(key, request.item.clone());
        Ok(())
    }

    fn get_item(&self, request: &GetItemRequest) -> StorageResult<Option<Item>> {
        let tables = self.tables.read();
        let table = tables
            .get(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;

        let key = table.key(&request.key)?;
        Ok(table
            .items
            .get(&key)
            .map(|item| project(item, &request.attributes_to_get)))
    }

    fn delete_item(&self, request: &DeleteItemRequest) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;

        let key = table.key(&request.key)?;
        table.items.remove(&key);
        Ok(())
    }

    fn batch_write_item(&self, request: &BatchWriteItemRequest) -> StorageResult<()> {
        if request.writes.len() > MAX_BATCH_WRITES {
            return Err(StorageError::BatchTooLarge {
                limit: MAX_BATCH_WRITES,
                actual: request.writes.len(),
            });
        }

        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;

        // Validate every key before applying any write.
        let keys = request
            .writes
            .iter()
            .map(|write| match write {
                WriteRequest::Put(item) | WriteRequest::Delete(item) => table.key(item),
            })
            .collect::<StorageResult<Vec<_>>>()?;

        for (write, key) in request.writes.iter().zip(keys) {
            match write {
                WriteRequest::Put(item) => {
                    table.items.insert(key, item.clone());
                }
                WriteRequest::Delete(_) => {
                    table.items.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn query(&self, request: &QueryRequest) -> StorageResult<QueryOutput> {
        let tables = self.tables.read();
        let table = tables
            .get(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;
        let schema = &table.schema;

        if request.hash_key != schema.hash_key {
            return Err(StorageError::invalid_request(format!(
                "{} is not the hash key of {}",
                request.hash_key, request.table
            )));
        }
        if let Some(AttributeCondition {
            attribute,
            condition,
        }) = &request.range_condition
        {
            if schema.range_key.as_deref() != Some(attribute.as_str()) {
                return Err(StorageError::invalid_request(format!(
                    "{attribute} is not the range key of {}",
                    request.table
                )));
            }
            if !condition.operator.is_key_condition() {
                return Err(StorageError::invalid_request(format!(
                    "{} is not a valid key condition",
                    condition.operator
                )));
            }
        }

        let mut matched: Vec<&Item> = table
            .items
            .values()
            .filter(|item| {
                item.get(&schema.hash_key)
                    .map_or(false, |v| equals(v, &request.hash_value))
            })
            .filter(|item| {
                request.range_condition.as_ref().map_or(true, |rc| {
                    condition_holds(item.get(&rc.attribute), &rc.condition)
                })
            })
            .collect();

        let range_of = |item: &Item| -> Option<AttributeValue> {
            schema
                .range_key
                .as_ref()
                .and_then(|rk| item.get(rk))
                .cloned()
        };
        matched.sort_by(|a, b| match (range_of(*a), range_of(*b)) {
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        });
        if !request.scan_index_forward {
            matched.reverse();
        }

        if let Some(start) = &request.exclusive_start_key {
            match start_range(schema, start) {
                Some(after) => matched.retain(|item| {
                    let ordering = range_of(*item)
                        .and_then(|r| r.compare(&after))
                        .unwrap_or(Ordering::Equal);
                    if request.scan_index_forward {
                        ordering == Ordering::Greater
                    } else {
                        ordering == Ordering::Less
                    }
                }),
                // One item per hash key; resuming past it leaves nothing.
                None => matched.clear(),
            }
        }

        tracing::trace!(
            table = %request.table,
            matched = matched.len(),
            "query"
        );

        Ok(self.page(
            schema,
            &matched,
            request.limit,
            &request.attributes_to_get,
            request.count_only,
        ))
    }

    fn scan(&self, request: &ScanRequest) -> StorageResult<QueryOutput> {
        let tables = self.tables.read();
        let table = tables
            .get(&request.table)
            .ok_or_else(|| table_not_found(&request.table))?;

        let lower = match &request.exclusive_start_key {
            Some(start) => Bound::Excluded(table.key(start)?),
            None => Bound::Unbounded,
        };

        let matched: Vec<&Item> = table
            .items
            .range((lower, Bound::Unbounded))
            .map(|(_, item)| item)
            .filter(|item| {
                request
                    .scan_filter
                    .iter()
                    .all(|f| condition_holds(item.get(&f.attribute), &f.condition))
            })
            .collect();

        tracing::trace!(
            table = %request.table,
            matched = matched.len(),
            "scan"
        );

        Ok(self.page(
            &table.schema,
            &matched,
            request.limit,
            &request.attributes_to_get,
            request.count_only,
        ))
    }
}

fn start_range(schema: &KeySchema, start: &Item) -> Option<AttributeValue> {
    schema
        .range_key
        .as_ref()
        .and_then(|rk| start.get(rk))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: i64) -> AttributeValue {
        AttributeValue::N(v.to_string())
    }

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_string())
    }

    fn item(id: i64, name: &str) -> Item {
        let mut item = Item::new();
        item.insert("id".into(), n(id));
        item.insert("name".into(), s(name));
        item
    }

    fn store() -> InMemoryKeyRangeStore {
        let store = InMemoryKeyRangeStore::new();
        store.create_table("items", KeySchema::hash_range("id", "name"));
        for (id, name) in [(1, "b"), (1, "a"), (1, "c"), (2, "a")] {
            store
                .put_item(&PutItemRequest {
                    table: "items".into(),
                    item: item(id, name),
                    expected: BTreeMap::new(),
                })
                .unwrap();
        }
        store
    }

    fn query(hash: i64) -> QueryRequest {
        QueryRequest {
            table: "items".into(),
            hash_key: "id".into(),
            hash_value: n(hash),
            range_condition: None,
            attributes_to_get: vec![],
            limit: None,
            scan_index_forward: true,
            exclusive_start_key: None,
            consistent_read: true,
            count_only: false,
        }
    }

    fn names(output: &QueryOutput) -> Vec<&str> {
        output
            .items
            .iter()
            .filter_map(|i| i.get("name").and_then(AttributeValue::scalar_text))
            .collect()
    }

    #[test]
    fn get_and_delete() {
        let store = store();
        let key = item(1, "a");
        let found = store
            .get_item(&GetItemRequest {
                table: "items".into(),
                key: key.clone(),
                attributes_to_get: vec![],
                consistent_read: true,
            })
            .unwrap();
        assert_eq!(found, Some(item(1, "a")));

        store
            .delete_item(&DeleteItemRequest {
                table: "items".into(),
                key,
            })
            .unwrap();
        assert_eq!(store.item_count("items"), 3);
    }

    #[test]
    fn missing_table_and_key() {
        let store = store();
        assert!(matches!(
            store.describe_table("nope"),
            Err(StorageError::NoSuchTable(_))
        ));

        let mut partial = Item::new();
        partial.insert("id".into(), n(1));
        let result = store.get_item(&GetItemRequest {
            table: "items".into(),
            key: partial,
            attributes_to_get: vec![],
            consistent_read: false,
        });
        assert!(matches!(result, Err(StorageError::InvalidRequest(_))));
    }

    #[test]
    fn query_orders_by_range_key() {
        let store = store();
        let forward = store.query(&query(1)).unwrap();
        assert_eq!(names(&forward), vec!["a", "b", "c"]);
        assert!(forward.last_evaluated_key.is_none());

        let mut backward = query(1);
        backward.scan_index_forward = false;
        assert_eq!(names(&store.query(&backward).unwrap()), vec!["c", "b", "a"]);
    }

    #[test]
    fn query_pages_with_last_evaluated_key() {
        let store = store();
        let mut request = query(1);
        request.limit = Some(2);

        let first = store.query(&request).unwrap();
        assert_eq!(names(&first), vec!["a", "b"]);
        let lek = first.last_evaluated_key.clone().unwrap();

        request.exclusive_start_key = Some(lek);
        let second = store.query(&request).unwrap();
        assert_eq!(names(&second), vec!["c"]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[test]
    fn query_range_condition() {
        let store = store();
        let mut request = query(1);
        request.range_condition = Some(AttributeCondition {
            attribute: "name".into(),
            condition: Condition::new(ComparisonOperator::Gt, vec![s("a")]),
        });
        assert_eq!(names(&store.query(&request).unwrap()), vec!["b", "c"]);

        request.range_condition = Some(AttributeCondition {
            attribute: "name".into(),
            condition: Condition::new(ComparisonOperator::Ne, vec![s("a")]),
        });
        assert!(matches!(
            store.query(&request),
            Err(StorageError::InvalidRequest(_))
        ));
    }

    #[test]
    fn scan_filters_and_counts() {
        let store = store();
        let request = ScanRequest {
            table: "items".into(),
            scan_filter: vec![AttributeCondition {
                attribute: "name".into(),
                condition: Condition::new(ComparisonOperator::Eq, vec![s("a")]),
            }],
            attributes_to_get: vec![],
            limit: None,
            exclusive_start_key: None,
            consistent_read: false,
            count_only: true,
        };
        let output = store.scan(&request).unwrap();
        assert_eq!(output.count, 2);
        assert!(output.items.is_empty());
    }

    #[test]
    fn scan_pages_cover_every_item_once() {
        let store = InMemoryKeyRangeStore::with_page_size(3);
        store.create_table("items", KeySchema::hash_range("id", "name"));
        for i in 0..10 {
            store
                .put_item(&PutItemRequest {
                    table: "items".into(),
                    item: item(i, "x"),
                    expected: BTreeMap::new(),
                })
                .unwrap();
        }

        let mut request = ScanRequest {
            table: "items".into(),
            scan_filter: vec![],
            attributes_to_get: vec![],
            limit: None,
            exclusive_start_key: None,
            consistent_read: false,
            count_only: false,
        };
        let mut seen = 0;
        loop {
            let page = store.scan(&request).unwrap();
            seen += page.items.len();
            match page.last_evaluated_key {
                Some(key) => request.exclusive_start_key = Some(key),
                None => break,
            }
        }
        assert_eq!(seen, 10);
    }

    #[test]
    fn conditional_put() {
        let store = store();
        let mut versioned = item(3, "v");
        versioned.insert("version".into(), n(1));

        let expect_absent = BTreeMap::from([(
            "version".to_string(),
            ExpectedAttribute {
                value: None,
                exists: false,
            },
        )]);
        store
            .put_item(&PutItemRequest {
                table: "items".into(),
                item: versioned.clone(),
                expected: expect_absent.clone(),
            })
            .unwrap();

        let err = store
            .put_item(&PutItemRequest {
                table: "items".into(),
                item: versioned.clone(),
                expected: expect_absent,
            })
            .unwrap_err();
        assert!(err.is_conditional_check_failed());

        versioned.insert("version".into(), n(2));
        store
            .put_item(&PutItemRequest {
                table: "items".into(),
                item: versioned,
                expected: BTreeMap::from([(
                    "version".to_string(),
                    ExpectedAttribute {
                        value: Some(n(1)),
                        exists: true,
                    },
                )]),
            })
            .unwrap();
    }

    #[test]
    fn condition_operators() {
        let tags = AttributeValue::SS(vec!["red".into(), "blue".into()]);
        let contains = Condition::new(ComparisonOperator::Contains, vec![s("red")]);
        assert!(condition_holds(Some(&tags), &contains));
        assert!(condition_holds(Some(&s("bored")), &contains));
        assert!(!condition_holds(None, &contains));

        let between = Condition::new(ComparisonOperator::Between, vec![n(5), n(10)]);
        assert!(condition_holds(Some(&n(10)), &between));
        assert!(!condition_holds(Some(&n(11)), &between));

        let is_null = Condition::new(ComparisonOperator::Null, vec![]);
        assert!(condition_holds(None, &is_null));
        assert!(!condition_holds(Some(&n(1)), &is_null));

        let one_of = Condition::new(ComparisonOperator::In, vec![n(1), n(2)]);
        assert!(condition_holds(Some(&AttributeValue::N("2.0".into())), &one_of));
    }
}
