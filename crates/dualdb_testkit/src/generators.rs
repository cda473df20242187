//! Property-based test generators using proptest.
//!
//! Generated records always conform to the sample schemas in
//! [`fixtures`](crate::fixtures).

use crate::fixtures::{item, person};
use dualdb_core::Record;
use proptest::prelude::*;

/// Strategy for key parts, including the `:` and `/` separators.
pub fn key_part_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9:/]{1,12}").expect("Invalid regex")
}

/// Strategy for person names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Strategy for ages.
///
/// Padded numbers only sort numerically when non-negative, so neither
/// backend is asked to compare negative ages.
pub fn age_strategy() -> impl Strategy<Value = i32> {
    0..1_000i32
}

/// Strategy for up to `max` person records with distinct names.
pub fn people_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_map(name_strategy(), age_strategy(), 0..=max).prop_map(|people| {
        people
            .into_iter()
            .map(|(name, age)| person(&name, age))
            .collect()
    })
}

/// Strategy for up to `max` item records sharing hash key `id`, with
/// distinct range keys.
pub fn items_strategy(id: i64, max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_set(0..100i32, 0..=max)
        .prop_map(move |ns| ns.into_iter().map(|n| item(id, n)).collect())
}
