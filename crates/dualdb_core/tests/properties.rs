//! Property tests: both backends agree with a plain filter over the input.

use dualdb_codec::{FieldType, Value};
use dualdb_core::{build_key, parse_key, Direction, EntitySchema, Record};
use dualdb_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn name_set(records: &[Record]) -> BTreeSet<String> {
    records
        .iter()
        .map(|r| r.value("name").to_string())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn count_and_collect_agree(
        people in people_strategy(30),
        threshold in age_strategy(),
        page_size in 1usize..8,
    ) {
        let expected: BTreeSet<String> = people
            .iter()
            .filter(|p| matches!(p.value("age"), Value::Int(age) if *age > threshold))
            .map(|p| p.value("name").to_string())
            .collect();

        for store in TestStore::all(page_size) {
            store.batch_put(PERSON, &people).unwrap();

            let mut query = store.query(PERSON).unwrap().where_gt("age", threshold).unwrap();
            prop_assert_eq!(query.count().unwrap(), expected.len() as u64);
            let found = query.collect_all().unwrap();
            prop_assert_eq!(found.len(), expected.len());
            prop_assert_eq!(name_set(&found), expected.clone());
        }
    }

    #[test]
    fn sorted_pages_stay_sorted(
        people in people_strategy(20),
        page_size in 1usize..6,
    ) {
        let store = TestStore::attribute_store(page_size);
        store.batch_put(PERSON, &people).unwrap();

        let found = store
            .query(PERSON)
            .unwrap()
            .order_by("age", Direction::Ascending)
            .unwrap()
            .collect_all()
            .unwrap();
        prop_assert_eq!(found.len(), people.len());
        let ages: Vec<&Value> = found.iter().map(|r| r.value("age")).collect();
        for pair in ages.windows(2) {
            prop_assert!(pair[0].as_i64() <= pair[1].as_i64());
        }
    }

    #[test]
    fn range_queries_page_in_key_order(
        items in items_strategy(9, 20),
        page_size in 1usize..6,
    ) {
        let store = TestStore::key_range(page_size);
        store.batch_put(ITEM, &items).unwrap();

        let found = store
            .query(ITEM)
            .unwrap()
            .where_eq("id", 9i64)
            .unwrap()
            .order_by("name", Direction::Ascending)
            .unwrap()
            .collect_all()
            .unwrap();
        let mut expected: Vec<String> =
            items.iter().map(|r| r.value("name").to_string()).collect();
        expected.sort();
        let names: Vec<String> = found.iter().map(|r| r.value("name").to_string()).collect();
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn composite_keys_split_back(id in key_part_strategy(), range in key_part_strategy()) {
        let schema = EntitySchema::builder("pair")
            .hash_key("id", FieldType::String)
            .range_key("range", FieldType::String)
            .build()
            .unwrap();
        let id_value = Value::from(id.as_str());
        let range_value = Value::from(range.as_str());
        let key = build_key(&schema, &id_value, Some(&range_value)).unwrap();
        let (parsed_id, parsed_range) = parse_key(&schema, &key).unwrap();
        prop_assert_eq!(parsed_id, Value::from(id));
        prop_assert_eq!(parsed_range, Some(Value::from(range)));
    }
}
