//! # DualDB Codec
//!
//! Typed string encoding for DualDB.
//!
//! Both storage services DualDB talks to keep attribute values as strings
//! and compare them lexicographically. This crate converts typed field
//! values to and from strings such that:
//! - `decode(encode(v)) == v` for every supported scalar type
//! - string order equals numeric order for non-negative integers and floats
//! - null and the empty string stay distinguishable on the way in
//!
//! ## Encoding Rules
//!
//! - Strings pass through unchanged
//! - `Byte`/`Short`/`Int`/`Long` are zero-padded to 3/5/10/19 digits
//! - `Float` has its integer part zero-padded to 16 digits
//! - `Double` is plain decimal text (not order-preserving)
//! - Booleans and chars use their textual forms
//! - Timestamps are RFC 3339 in UTC with a fixed nine-digit fraction
//! - Structured values are JSON and never usable as filter operands
//!
//! ## Usage
//!
//! ```
//! use dualdb_codec::{decode, encode, FieldType, Value};
//!
//! let stored = encode(&Value::Int(25), FieldType::Int).unwrap();
//! assert_eq!(stored.as_deref(), Some("0000000025"));
//!
//! let decoded = decode(stored.as_deref(), FieldType::Int).unwrap();
//! assert_eq!(decoded, Value::Int(25));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode, decode_set, parse_number};
pub use encoder::{
    encode, encode_set, is_encodable, number_text, BYTE_WIDTH, FLOAT_WIDTH, INT_WIDTH,
    LONG_WIDTH, SHORT_WIDTH,
};
pub use error::{CodecError, CodecResult};
pub use value::{FieldType, ScalarType, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn roundtrip(value: Value, field_type: FieldType) {
        let stored = encode(&value, field_type).unwrap();
        let decoded = decode(stored.as_deref(), field_type).unwrap();
        assert_eq!(decoded, value, "stored form {stored:?}");
    }

    #[test]
    fn roundtrip_null() {
        roundtrip(Value::Null, FieldType::String);
        roundtrip(Value::Null, FieldType::Long);
        roundtrip(Value::Null, FieldType::Json);
    }

    #[test]
    fn roundtrip_strings() {
        roundtrip(Value::from("hello world"), FieldType::String);
        roundtrip(Value::from(""), FieldType::String);
        roundtrip(Value::from("a:b/c"), FieldType::String);
    }

    #[test]
    fn roundtrip_integers_at_the_edges() {
        for n in [0i8, 1, -1, i8::MIN, i8::MAX] {
            roundtrip(Value::Byte(n), FieldType::Byte);
        }
        for n in [0i16, -7, i16::MIN, i16::MAX] {
            roundtrip(Value::Short(n), FieldType::Short);
        }
        for n in [0i32, 25, -25, i32::MIN, i32::MAX] {
            roundtrip(Value::Int(n), FieldType::Int);
        }
        for n in [0i64, 31, -31, i64::MIN, i64::MAX] {
            roundtrip(Value::Long(n), FieldType::Long);
        }
    }

    #[test]
    fn roundtrip_floats() {
        for f in [0.0f32, 1.5, -1.5, 0.1, 123_456.78, f32::MAX, f32::MIN_POSITIVE] {
            roundtrip(Value::Float(f), FieldType::Float);
        }
        for f in [0.0f64, 2.5, -1e-9, 1e300] {
            roundtrip(Value::Double(f), FieldType::Double);
        }
    }

    #[test]
    fn roundtrip_literals() {
        roundtrip(Value::Bool(true), FieldType::Bool);
        roundtrip(Value::Bool(false), FieldType::Bool);
        roundtrip(Value::Char('/'), FieldType::Char);
        let ts = Utc.with_ymd_and_hms(2011, 5, 6, 7, 8, 9).unwrap();
        roundtrip(Value::Timestamp(ts), FieldType::Timestamp);
    }

    #[test]
    fn timestamps_keep_sub_millisecond_digits() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        roundtrip(Value::Timestamp(ts), FieldType::Timestamp);

        let earlier = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let a = encode(&Value::Timestamp(earlier), FieldType::Timestamp).unwrap();
        let b = encode(&Value::Timestamp(ts), FieldType::Timestamp).unwrap();
        assert_eq!(a.as_deref(), Some("2023-11-14T22:13:20.123456000Z"));
        assert!(a < b);
    }

    #[test]
    fn roundtrip_structured() {
        roundtrip(
            Value::Json(serde_json::json!({"tags": ["a", "b"], "n": 3})),
            FieldType::Json,
        );
        roundtrip(
            Value::Set(vec![Value::Long(1), Value::Long(-2)]),
            FieldType::Set(ScalarType::Long),
        );
    }

    proptest! {
        #[test]
        fn roundtrip_any_long(n in any::<i64>()) {
            let stored = encode(&Value::Long(n), FieldType::Long).unwrap();
            prop_assert_eq!(decode(stored.as_deref(), FieldType::Long).unwrap(), Value::Long(n));
        }

        #[test]
        fn roundtrip_any_finite_float(f in any::<f32>().prop_filter("finite", |f| f.is_finite())) {
            let stored = encode(&Value::Float(f), FieldType::Float).unwrap();
            prop_assert_eq!(decode(stored.as_deref(), FieldType::Float).unwrap(), Value::Float(f));
        }

        #[test]
        fn roundtrip_any_string(s in ".*") {
            let stored = encode(&Value::from(s.as_str()), FieldType::String).unwrap();
            let decoded = decode(stored.as_deref(), FieldType::String).unwrap();
            prop_assert_eq!(decoded, Value::String(s));
        }
    }
}
