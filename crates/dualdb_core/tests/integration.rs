//! Integration tests running the same scenarios on both backends.

use dualdb_codec::Value;
use dualdb_core::{
    route, BackendKind, Config, CoreError, Direction, Operator, Query, Record, Route, SelectShape,
};
use dualdb_testkit::prelude::*;

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.value("name").to_string())
        .collect()
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

fn count(query: Query<'_>) -> u64 {
    query.count().unwrap()
}

fn seed_people(store: &TestStore, count: i32) {
    for i in 0..count {
        let mut p = person(&format!("p{i:02}"), i);
        store.put(PERSON, &mut p).unwrap();
    }
}

fn seed_items(store: &TestStore, id: i64, count: i32) {
    let items: Vec<Record> = (0..count).map(|n| item(id, n)).collect();
    store.batch_put(ITEM, &items).unwrap();
}

#[test]
fn put_get_update_delete() {
    with_each_backend(10, |store| {
        let mut abc = person("abc", 25).with("tags", vec!["a", "b"]);
        store.put(PERSON, &mut abc).unwrap();
        let found = store.get(PERSON, "abc").unwrap().unwrap();
        assert_eq!(found.value("age"), &Value::Int(25));
        assert!(found.contains("tags"));

        // Clearing a field removes it from storage.
        let mut updated = person("abc", 26);
        store.put(PERSON, &mut updated).unwrap();
        let found = store.get(PERSON, "abc").unwrap().unwrap();
        assert_eq!(found.value("age"), &Value::Int(26));
        assert!(!found.contains("tags"), "{} kept a cleared field", store.kind());

        store.delete(PERSON, "abc").unwrap();
        assert!(store.get(PERSON, "abc").unwrap().is_none());
        assert!(store.get(PERSON, "nobody").unwrap().is_none());
    });
}

#[test]
fn composite_keys() {
    with_each_backend(10, |store| {
        let mut it = item(31, 1);
        store.put(ITEM, &mut it).unwrap();

        let found = store.get_composite(ITEM, 31i64, "item1").unwrap();
        assert_eq!(found, Some(it));
        assert!(store.get_composite(ITEM, 31i64, "item2").unwrap().is_none());

        assert!(matches!(
            store.get(ITEM, 31i64),
            Err(CoreError::MissingRangeKey { .. })
        ));
        assert!(matches!(
            store.get_composite(PERSON, "abc", "x"),
            Err(CoreError::Validation { .. })
        ));

        store.delete_composite(ITEM, 31i64, "item1").unwrap();
        assert!(store.get_composite(ITEM, 31i64, "item1").unwrap().is_none());
    });
}

#[test]
fn key_parts_with_separators() {
    with_each_backend(10, |store| {
        let mut odd = Record::new()
            .with("id", 4i64)
            .with("name", "a:b/c")
            .with("count", 1);
        store.put(ITEM, &mut odd).unwrap();

        let all = store.query(ITEM).unwrap().collect_all().unwrap();
        assert_eq!(all, vec![odd]);

        let keys = store
            .query(ITEM)
            .unwrap()
            .select(&["id", "name"])
            .unwrap()
            .collect_all()
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].value("name"), &Value::from("a:b/c"));
        assert_eq!(keys[0].value("id"), &Value::Long(4));
    });
}

#[test]
fn batches_larger_than_a_service_call() {
    with_each_backend(7, |store| {
        let people: Vec<Record> = (0..60).map(|i| person(&format!("p{i:02}"), i)).collect();
        store.batch_put(PERSON, &people).unwrap();
        assert_eq!(store.query(PERSON).unwrap().count().unwrap(), 60);

        store.batch_delete(PERSON, &people[..45]).unwrap();
        let left = store.query(PERSON).unwrap().collect_all().unwrap();
        assert_eq!(sorted(names(&left)), names(&people[45..]));
    });
}

#[test]
fn small_batch_write_limit() {
    let stores = [
        TestStore::attribute_store_with(10, Config::new().batch_write_limit(4)),
        TestStore::key_range_with(10, Config::new().batch_write_limit(4)),
    ];
    for store in stores {
        seed_items(&store, 1, 10);
        assert_eq!(store.query(ITEM).unwrap().count().unwrap(), 10);
    }
}

#[test]
fn batch_get_reads_one_key() {
    with_each_backend(10, |store| {
        seed_people(store, 2);
        assert_eq!(store.batch_get(PERSON, &["p01".into()]).unwrap().len(), 1);
        assert!(matches!(
            store.batch_get(PERSON, &["p00".into(), "p01".into()]),
            Err(CoreError::UnsupportedOperation { .. })
        ));
    });
}

#[test]
fn optimistic_locking() {
    with_each_backend(10, |store| {
        let mut first = doc("d", "one");
        store.put(DOC, &mut first).unwrap();
        assert_eq!(first.value("version"), &Value::Long(1));

        let mut a = store.get(DOC, "d").unwrap().unwrap();
        let mut b = a.clone();

        a.set("body", "two");
        store.put(DOC, &mut a).unwrap();
        assert_eq!(a.value("version"), &Value::Long(2));

        b.set("body", "three");
        let stale = b.clone();
        let err = store.put(DOC, &mut b).unwrap_err();
        assert!(matches!(err, CoreError::OptimisticLockConflict { .. }));
        assert_eq!(b, stale);

        let stored = store.get(DOC, "d").unwrap().unwrap();
        assert_eq!(stored.value("body"), &Value::from("two"));
        assert_eq!(stored.value("version"), &Value::Long(2));

        // A fresh record for an existing key conflicts too.
        let mut again = doc("d", "four");
        assert!(matches!(
            store.put(DOC, &mut again),
            Err(CoreError::OptimisticLockConflict { .. })
        ));
    });
}

#[test]
fn batch_put_skips_version_checks() {
    with_each_backend(10, |store| {
        let mut first = doc("d", "one");
        store.put(DOC, &mut first).unwrap();

        let stale = doc("d", "two").with("version", 7i64);
        store.batch_put(DOC, &[stale]).unwrap();
        let stored = store.get(DOC, "d").unwrap().unwrap();
        assert_eq!(stored.value("version"), &Value::Long(7));
    });
}

#[test]
fn models() {
    with_each_backend(10, |store| {
        let mut abc = Person {
            name: "abc".into(),
            age: Some(25),
        };
        store.put_model(&mut abc).unwrap();
        let found: Option<Person> = store.get_model("abc", None).unwrap();
        assert_eq!(found, Some(abc));
        assert!(store.get_model::<Person>("nobody", None).unwrap().is_none());
    });
}

#[test]
fn filters() {
    with_each_backend(4, |store| {
        seed_people(store, 10);
        let mut tagged = person("tagged", 50).with("tags", vec!["x", "y"]);
        store.put(PERSON, &mut tagged).unwrap();

        let people = || store.query(PERSON).unwrap();

        assert_eq!(count(people().where_ge("age", 5).unwrap()), 6);
        assert_eq!(count(people().where_lt("age", 3).unwrap()), 3);
        assert_eq!(count(people().where_between("age", 2, 4).unwrap()), 3);
        assert_eq!(count(people().where_in("age", [1, 3, 99]).unwrap()), 2);
        assert_eq!(count(people().where_eq("name", "p07").unwrap()), 1);
        assert_eq!(count(people().where_begins_with("name", "p0").unwrap()), 10);
        assert_eq!(count(people().where_contains("tags", "y").unwrap()), 1);
        assert_eq!(count(people().where_not_null("tags").unwrap()), 1);
        assert_eq!(
            count(
                people()
                    .where_ge("age", 2)
                    .unwrap()
                    .where_le("age", 8)
                    .unwrap()
            ),
            7
        );

        let found = people()
            .where_contains("tags", "x")
            .unwrap()
            .collect_all()
            .unwrap();
        assert_eq!(names(&found), vec!["tagged"]);
    });
}

#[test]
fn wildcard_characters_in_operands_are_literal() {
    with_each_backend(2, |store| {
        for name in ["50abc", "50%off", "a_c", "abc", "a\\c"] {
            store.put(PERSON, &mut person(name, 1)).unwrap();
        }
        let people = || store.query(PERSON).unwrap();
        let kind = store.kind();

        assert_eq!(count(people().where_begins_with("name", "50%").unwrap()), 1, "{kind}");
        assert_eq!(count(people().where_contains("name", "_").unwrap()), 1, "{kind}");
        assert_eq!(count(people().where_contains("name", "\\").unwrap()), 1, "{kind}");
        let without_percent = people()
            .filter("name", Operator::NotContains, vec!["%".into()])
            .unwrap();
        assert_eq!(count(without_percent), 4, "{kind}");

        let found = people()
            .where_begins_with("name", "a_")
            .unwrap()
            .collect_all()
            .unwrap();
        assert_eq!(names(&found), vec!["a_c"], "{kind}");
    });
}

#[test]
fn backend_specific_operators() {
    let attribute = TestStore::attribute_store(10);
    assert!(attribute.query(PERSON).unwrap().where_like("name", "p%").is_ok());
    assert!(matches!(
        attribute
            .query(PERSON)
            .unwrap()
            .filter("tags", Operator::NotContains, vec!["x".into()]),
        Err(CoreError::UnsupportedOperation { .. })
    ));

    let key_range = TestStore::key_range(10);
    assert!(matches!(
        key_range.query(PERSON).unwrap().where_like("name", "p%"),
        Err(CoreError::UnsupportedOperation { .. })
    ));
    assert!(key_range
        .query(PERSON)
        .unwrap()
        .filter("tags", Operator::NotContains, vec!["x".into()])
        .is_ok());
}

#[test]
fn paging_covers_every_record_once() {
    with_each_backend(3, |store| {
        seed_people(store, 10);

        let mut query = store.query(PERSON).unwrap();
        assert!(query.has_next());
        let mut seen = Vec::new();
        while query.has_next() {
            seen.extend(query.run().unwrap());
        }
        assert_eq!(seen.len(), 10);
        assert!(!query.has_next());
        assert!(query.run().unwrap().is_empty());

        let again = query.collect_all().unwrap();
        assert_eq!(sorted(names(&again)), sorted(names(&seen)));
        let expected: Vec<String> = (0..10).map(|i| format!("p{i:02}")).collect();
        assert_eq!(sorted(names(&seen)), expected);
    });
}

#[test]
fn limit_applies_per_batch() {
    with_each_backend(100, |store| {
        seed_people(store, 5);
        let mut query = store.query(PERSON).unwrap().limit(2).unwrap();
        assert_eq!(query.run().unwrap().len(), 2);
        assert!(query.has_next());
        assert_eq!(query.collect_all().unwrap().len(), 5);

        assert!(matches!(
            store.query(PERSON).unwrap().limit(0),
            Err(CoreError::Validation { .. })
        ));
    });
}

#[test]
fn default_page_size() {
    let config = || Config::new().default_page_size(2);
    for store in [
        TestStore::attribute_store_with(100, config()),
        TestStore::key_range_with(100, config()),
    ] {
        seed_people(&store, 5);
        let mut query = store.query(PERSON).unwrap();
        assert_eq!(query.run().unwrap().len(), 2, "{}", store.kind());
    }
}

#[test]
fn attribute_store_sorts_any_scalar() {
    let store = TestStore::attribute_store(3);
    seed_people(&store, 10);

    let records = store
        .query(PERSON)
        .unwrap()
        .where_ge("age", 4)
        .unwrap()
        .order_by("age", Direction::Descending)
        .unwrap()
        .collect_all()
        .unwrap();
    let ages: Vec<&Value> = records.iter().map(|r| r.value("age")).collect();
    let expected: Vec<Value> = (4..10).rev().map(Value::Int).collect();
    assert_eq!(ages, expected.iter().collect::<Vec<_>>());

    assert!(matches!(
        store
            .query(PERSON)
            .unwrap()
            .order_by("tags", Direction::Ascending),
        Err(CoreError::UnsupportedOrderBy { .. })
    ));
    assert!(matches!(
        store
            .query(PERSON)
            .unwrap()
            .select(&["name"])
            .unwrap()
            .order_by("age", Direction::Ascending),
        Err(CoreError::UnsupportedOrderBy { .. })
    ));
}

#[test]
fn key_range_sorts_the_range_key_of_a_query() {
    let store = TestStore::key_range(2);
    seed_items(&store, 1, 5);
    seed_items(&store, 2, 3);

    let mut query = store
        .query(ITEM)
        .unwrap()
        .where_eq("id", 1i64)
        .unwrap()
        .order_by("name", Direction::Descending)
        .unwrap();
    assert!(matches!(route(query.spec()), Route::Query { range: None, .. }));
    let records = query.collect_all().unwrap();
    assert_eq!(
        names(&records),
        vec!["item4", "item3", "item2", "item1", "item0"]
    );

    let count = store
        .query(ITEM)
        .unwrap()
        .where_eq("id", 1i64)
        .unwrap()
        .where_gt("name", "item1")
        .unwrap();
    assert!(matches!(route(count.spec()), Route::Query { range: Some(_), .. }));
    assert_eq!(count.count().unwrap(), 3);

    assert!(matches!(
        store.query(ITEM).unwrap().order_by("count", Direction::Ascending),
        Err(CoreError::UnsupportedOrderBy { .. })
    ));
    assert!(matches!(
        store.query(PERSON).unwrap().order_by("age", Direction::Ascending),
        Err(CoreError::UnsupportedOrderBy { .. })
    ));
}

#[test]
fn key_range_scan_cannot_sort() {
    let store = TestStore::key_range(10);
    seed_items(&store, 1, 5);

    let mut query = store
        .query(ITEM)
        .unwrap()
        .where_gt("count", 1)
        .unwrap()
        .order_by("name", Direction::Ascending)
        .unwrap();
    assert_eq!(route(query.spec()), Route::Scan);
    assert!(matches!(
        query.run(),
        Err(CoreError::OrderByRequiresQuery { .. })
    ));
    assert!(matches!(
        query.count(),
        Err(CoreError::OrderByRequiresQuery { .. })
    ));

    // Without a sort the same filter scans fine.
    let scan = store.query(ITEM).unwrap().where_gt("count", 1).unwrap();
    assert_eq!(scan.count().unwrap(), 3);
}

#[test]
fn select_shapes() {
    with_each_backend(4, |store| {
        seed_items(store, 1, 5);
        let items = || store.query(ITEM).unwrap().where_eq("id", 1i64).unwrap();

        let mut keys = items().select(&["id", "name"]).unwrap();
        assert_eq!(keys.shape(), SelectShape::IdAndRange);
        let keys = keys.collect_all().unwrap();
        assert_eq!(keys.len(), 5);
        for record in &keys {
            assert_eq!(record.len(), 2, "{}: {record:?}", store.kind());
            assert_eq!(record.value("id"), &Value::Long(1));
        }
        assert_eq!(
            sorted(names(&keys)),
            vec!["item0", "item1", "item2", "item3", "item4"]
        );

        let mut counts = items().select(&["count"]).unwrap();
        assert_eq!(counts.shape(), SelectShape::OthersOnly);
        let counts = counts.collect_all().unwrap();
        assert_eq!(counts.len(), 5);
        for record in &counts {
            assert!(record.contains("count"));
            match store.kind() {
                // Key attributes always come back from a key/range read.
                BackendKind::KeyRange => assert!(record.contains("id")),
                BackendKind::AttributeStore => assert_eq!(record.len(), 1),
            }
        }

        let mut ids = items().select(&["id"]).unwrap();
        assert_eq!(ids.shape(), SelectShape::IdOnly);
        for record in ids.collect_all().unwrap() {
            assert_eq!(record.value("id"), &Value::Long(1));
        }

        let mut everything = items().select(&["id", "name", "count"]).unwrap();
        assert_eq!(everything.shape(), SelectShape::IdRangeAndOthers);
        let everything = everything.collect_all().unwrap();
        let all = items().collect_all().unwrap();
        assert_eq!(sorted(names(&everything)), sorted(names(&all)));
        assert!(everything.iter().all(|r| r.len() == 3));
    });
}

#[test]
fn unknown_fields_are_rejected() {
    with_each_backend(10, |store| {
        assert!(matches!(
            store.query(PERSON).unwrap().where_eq("height", 1),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            store.query(PERSON).unwrap().select(&["height"]),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            store.query("nobody"),
            Err(CoreError::UnknownEntity { .. })
        ));
    });
}
