//! Order-preserving string encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{FieldType, ScalarType, Value};
use chrono::SecondsFormat;

/// Digits used for `Byte` values.
pub const BYTE_WIDTH: usize = 3;
/// Digits used for `Short` values.
pub const SHORT_WIDTH: usize = 5;
/// Digits used for `Int` values.
pub const INT_WIDTH: usize = 10;
/// Digits used for `Long` values.
pub const LONG_WIDTH: usize = 19;
/// Digits used for the integer part of `Float` values.
pub const FLOAT_WIDTH: usize = 16;

/// Encode a value of the given field type to its stored string form.
///
/// Returns `None` for [`Value::Null`]; the null marker is never an empty
/// string. Integers are zero-padded to a fixed width so that string order
/// matches numeric order for non-negative values. Doubles are written as
/// plain decimal text and do not sort lexicographically. Structured values
/// and sets are written as JSON.
///
/// # Errors
///
/// Returns an error if the value cannot be coerced to `field_type` or the
/// structured serialization fails.
pub fn encode(value: &Value, field_type: FieldType) -> CodecResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }

    let value = value.clone().coerce(field_type)?;
    let text = match (&value, field_type) {
        (Value::Json(json), _) => serde_json::to_string(json)?,
        (Value::Set(items), FieldType::Set(elem)) => encode_set_as_json(items, elem)?,
        (scalar, _) => encode_scalar(scalar)?,
    };
    Ok(Some(text))
}

/// Encode each element of a set value, skipping null elements.
///
/// This is the form used by backends with native multi-valued attributes.
///
/// # Errors
///
/// Returns an error if an element cannot be coerced to `elem`.
pub fn encode_set(value: &Value, elem: ScalarType) -> CodecResult<Vec<String>> {
    match value.clone().coerce(FieldType::Set(elem))? {
        Value::Null => Ok(Vec::new()),
        Value::Set(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(encode_scalar)
            .collect(),
        other => Err(CodecError::type_mismatch(FieldType::Set(elem), other.kind())),
    }
}

/// Returns whether values of `field_type` may appear as filter operands.
///
/// Structured fields are only ever stored, never compared.
pub fn is_encodable(field_type: FieldType) -> bool {
    !matches!(field_type, FieldType::Json)
}

/// Plain decimal text of a numeric value, without padding.
///
/// Used by backends with a native number type.
///
/// # Errors
///
/// Returns [`CodecError::NotNumeric`] for non-numeric or non-finite values.
pub fn number_text(value: &Value) -> CodecResult<String> {
    let text = match value {
        Value::Byte(n) => n.to_string(),
        Value::Short(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Long(n) => n.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Double(f) if f.is_finite() => f.to_string(),
        other => {
            return Err(CodecError::NotNumeric {
                kind: other.kind().to_string(),
            })
        }
    };
    Ok(text)
}

/// Encode a scalar value that has already been coerced to its field type.
pub(crate) fn encode_scalar(value: &Value) -> CodecResult<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Byte(n) => pad_integer(i64::from(*n), BYTE_WIDTH),
        Value::Short(n) => pad_integer(i64::from(*n), SHORT_WIDTH),
        Value::Int(n) => pad_integer(i64::from(*n), INT_WIDTH),
        Value::Long(n) => pad_integer(*n, LONG_WIDTH),
        Value::Float(f) => pad_float(*f),
        Value::Double(f) => f.to_string(),
        Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Nanos, true),
        Value::Json(json) => serde_json::to_string(json)?,
        other => {
            return Err(CodecError::type_mismatch("scalar", other.kind()));
        }
    };
    Ok(text)
}

fn encode_set_as_json(items: &[Value], elem: ScalarType) -> CodecResult<String> {
    let encoded = encode_set(&Value::Set(items.to_vec()), elem)?;
    Ok(serde_json::to_string(&encoded)?)
}

/// Zero-pads `n` to `width` characters; the sign takes one of them.
fn pad_integer(n: i64, width: usize) -> String {
    format!("{n:0width$}")
}

fn pad_float(f: f32) -> String {
    if !f.is_finite() {
        return f.to_string();
    }

    let magnitude = f.abs().to_string();
    let (int_part, frac_part) = match magnitude.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (magnitude.as_str(), None),
    };

    let mut out = String::with_capacity(FLOAT_WIDTH + 12);
    if f < 0.0 {
        out.push('-');
    }
    for _ in int_part.len()..FLOAT_WIDTH {
        out.push('0');
    }
    out.push_str(int_part);
    if let Some(frac_part) = frac_part {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
