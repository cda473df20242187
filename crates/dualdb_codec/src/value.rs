//! Field types and dynamic field values.

use crate::error::{CodecError, CodecResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a scalar field or of a set-valued field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// UTF-8 text.
    String,
    /// Boolean.
    Bool,
    /// A single character.
    Char,
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// UTC timestamp with nanosecond precision.
    Timestamp,
}

impl ScalarType {
    /// Returns true for the integer and floating point types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Int | Self::Long | Self::Float | Self::Double
        )
    }

    /// Returns true for the bounded-width integer types.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Lower-case name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// UTF-8 text, stored verbatim.
    String,
    /// Boolean, stored as `true`/`false`.
    Bool,
    /// Single character.
    Char,
    /// 8-bit integer, zero-padded to 3 digits.
    Byte,
    /// 16-bit integer, zero-padded to 5 digits.
    Short,
    /// 32-bit integer, zero-padded to 10 digits.
    Int,
    /// 64-bit integer, zero-padded to 19 digits.
    Long,
    /// Single-precision float, integer part zero-padded to 16 digits.
    Float,
    /// Double-precision float, stored as plain decimal text.
    Double,
    /// UTC timestamp in RFC 3339 form with a nine-digit fraction.
    Timestamp,
    /// Arbitrary structured data, stored as JSON text.
    Json,
    /// Multiple values of one scalar type.
    Set(ScalarType),
}

impl FieldType {
    /// Returns the scalar type for non-set, non-structured fields.
    #[must_use]
    pub const fn scalar(self) -> Option<ScalarType> {
        match self {
            Self::String => Some(ScalarType::String),
            Self::Bool => Some(ScalarType::Bool),
            Self::Char => Some(ScalarType::Char),
            Self::Byte => Some(ScalarType::Byte),
            Self::Short => Some(ScalarType::Short),
            Self::Int => Some(ScalarType::Int),
            Self::Long => Some(ScalarType::Long),
            Self::Float => Some(ScalarType::Float),
            Self::Double => Some(ScalarType::Double),
            Self::Timestamp => Some(ScalarType::Timestamp),
            Self::Json | Self::Set(_) => None,
        }
    }

    /// Returns the element type of a set field.
    #[must_use]
    pub const fn set_element(self) -> Option<ScalarType> {
        match self {
            Self::Set(elem) => Some(elem),
            _ => None,
        }
    }

    /// Returns true for set-valued fields.
    #[must_use]
    pub const fn is_set(self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Returns true for numeric scalar fields.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        match self.scalar() {
            Some(s) => s.is_numeric(),
            None => false,
        }
    }
}

impl From<ScalarType> for FieldType {
    fn from(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::String => Self::String,
            ScalarType::Bool => Self::Bool,
            ScalarType::Char => Self::Char,
            ScalarType::Byte => Self::Byte,
            ScalarType::Short => Self::Short,
            ScalarType::Int => Self::Int,
            ScalarType::Long => Self::Long,
            ScalarType::Float => Self::Float,
            ScalarType::Double => Self::Double,
            ScalarType::Timestamp => Self::Timestamp,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Set(elem) => write!(f, "set<{elem}>"),
            other => match other.scalar() {
                Some(s) => f.write_str(s.name()),
                None => Ok(()),
            },
        }
    }
}

/// A dynamically typed field value.
///
/// `Null` is distinct from an empty string; how each backend stores it is
/// decided by the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Text.
    String(String),
    /// Boolean.
    Bool(bool),
    /// Single character.
    Char(char),
    /// 8-bit integer.
    Byte(i8),
    /// 16-bit integer.
    Short(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Structured data.
    Json(serde_json::Value),
    /// Multiple scalar values.
    Set(Vec<Value>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Set(_) => "set",
        }
    }

    /// Get this value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get any integer value widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::Short(n) => Some(i64::from(*n)),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Get any numeric value widened to `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(f) => Some(*f),
            other => other.as_i64().map(|n| n as f64),
        }
    }

    /// Get the elements of a set value.
    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Converts this value to the representation required by `target`.
    ///
    /// Integer literals are narrowed or widened with range checks and
    /// promoted to floats, a one-character string becomes a `Char`, and set
    /// elements are coerced to the set's element type. `Null` is accepted
    /// for every type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] when no conversion exists and
    /// [`CodecError::OutOfRange`] when an integer does not fit.
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(self, target: FieldType) -> CodecResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        match target {
            FieldType::Json => match self {
                json @ Value::Json(_) => Ok(json),
                other => Err(CodecError::type_mismatch(target, other.kind())),
            },
            FieldType::Set(elem) => match self {
                Value::Set(items) => items
                    .into_iter()
                    .map(|item| item.coerce(elem.into()))
                    .collect::<CodecResult<Vec<_>>>()
                    .map(Value::Set),
                other => Err(CodecError::type_mismatch(target, other.kind())),
            },
            FieldType::String => match self {
                s @ Value::String(_) => Ok(s),
                Value::Char(c) => Ok(Value::String(c.to_string())),
                other => Err(CodecError::type_mismatch(target, other.kind())),
            },
            FieldType::Bool => match self {
                b @ Value::Bool(_) => Ok(b),
                other => Err(CodecError::type_mismatch(target, other.kind())),
            },
            FieldType::Char => match self {
                c @ Value::Char(_) => Ok(c),
                Value::String(s) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(Value::Char(c)),
                        _ => Err(CodecError::type_mismatch(target, "string")),
                    }
                }
                other => Err(CodecError::type_mismatch(target, other.kind())),
            },
            FieldType::Byte | FieldType::Short | FieldType::Int | FieldType::Long => {
                let n = self
                    .as_i64()
                    .ok_or_else(|| CodecError::type_mismatch(target, self.kind()))?;
                narrow_integer(n, target)
            }
            FieldType::Float => match self {
                f @ Value::Float(_) => Ok(f),
                other => match other.as_i64() {
                    Some(n) => Ok(Value::Float(n as f32)),
                    None => Err(CodecError::type_mismatch(target, other.kind())),
                },
            },
            FieldType::Double => match self {
                d @ Value::Double(_) => Ok(d),
                Value::Float(f) => Ok(Value::Double(f64::from(f))),
                other => match other.as_i64() {
                    Some(n) => Ok(Value::Double(n as f64)),
                    None => Err(CodecError::type_mismatch(target, other.kind())),
                },
            },
            FieldType::Timestamp => match self {
                ts @ Value::Timestamp(_) => Ok(ts),
                other => Err(CodecError::type_mismatch(target, other.kind())),
            },
        }
    }
}

fn narrow_integer(n: i64, target: FieldType) -> CodecResult<Value> {
    let out_of_range = || CodecError::out_of_range(n, target);
    match target {
        FieldType::Byte => i8::try_from(n).map(Value::Byte).map_err(|_| out_of_range()),
        FieldType::Short => i16::try_from(n).map(Value::Short).map_err(|_| out_of_range()),
        FieldType::Int => i32::try_from(n).map(Value::Int).map_err(|_| out_of_range()),
        _ => Ok(Value::Long(n)),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Byte(n) => write!(f, "{n}"),
            Value::Short(n) => write!(f, "{n}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Json(json) => write!(f, "{json}"),
            Value::Set(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<i8> for Value {
    fn from(n: i8) -> Self {
        Value::Byte(n)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Short(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Set(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_widens_integer_literals() {
        assert_eq!(Value::Int(25).coerce(FieldType::Long).unwrap(), Value::Long(25));
        assert_eq!(Value::Long(7).coerce(FieldType::Byte).unwrap(), Value::Byte(7));
        assert_eq!(Value::Int(3).coerce(FieldType::Double).unwrap(), Value::Double(3.0));
    }

    #[test]
    fn coerce_rejects_overflow() {
        let err = Value::Int(300).coerce(FieldType::Byte).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { .. }));
    }

    #[test]
    fn coerce_rejects_mismatched_kinds() {
        let err = Value::from("abc").coerce(FieldType::Int).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
        assert!(Value::Bool(true).coerce(FieldType::Json).is_err());
    }

    #[test]
    fn coerce_single_char_string() {
        assert_eq!(Value::from("x").coerce(FieldType::Char).unwrap(), Value::Char('x'));
        assert!(Value::from("xy").coerce(FieldType::Char).is_err());
    }

    #[test]
    fn coerce_set_elements() {
        let set = Value::from(vec![1i32, 2, 3]);
        assert_eq!(
            set.coerce(FieldType::Set(ScalarType::Long)).unwrap(),
            Value::Set(vec![Value::Long(1), Value::Long(2), Value::Long(3)])
        );
    }

    #[test]
    fn null_coerces_to_anything() {
        assert_eq!(Value::Null.coerce(FieldType::Timestamp).unwrap(), Value::Null);
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::Long.to_string(), "long");
        assert_eq!(FieldType::Set(ScalarType::String).to_string(), "set<string>");
        assert_eq!(FieldType::Json.to_string(), "json");
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Short(4).as_i64(), Some(4));
        assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(vec!["a", "b"]).as_set().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn field_types_serialize() {
        let json = serde_json::to_string(&FieldType::Set(ScalarType::Long)).unwrap();
        assert_eq!(json, r#"{"Set":"Long"}"#);
        let back: FieldType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FieldType::Set(ScalarType::Long));
    }
}
