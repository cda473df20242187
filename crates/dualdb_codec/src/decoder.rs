//! Decoder for stored string forms.

use crate::error::{CodecError, CodecResult};
use crate::value::{FieldType, ScalarType, Value};
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// Decode a stored string back into a value of `field_type`.
///
/// A missing string decodes to [`Value::Null`]. An empty string decodes to
/// `Null` for every type except `String`: backends cannot always keep an
/// empty string and an absent value apart, so only text fields preserve it.
///
/// Both the zero-padded form and plain decimal text decode to the same
/// number, so this also reads native number attributes.
///
/// # Errors
///
/// Returns [`CodecError::InvalidText`] if the text is not a valid
/// representation of `field_type`.
pub fn decode(text: Option<&str>, field_type: FieldType) -> CodecResult<Value> {
    let Some(text) = text else {
        return Ok(Value::Null);
    };
    if text.is_empty() && field_type != FieldType::String {
        return Ok(Value::Null);
    }

    match field_type {
        FieldType::Json => Ok(Value::Json(serde_json::from_str(text)?)),
        FieldType::Set(elem) => {
            let encoded: Vec<String> = serde_json::from_str(text)?;
            decode_set(&encoded, elem)
        }
        scalar => match scalar.scalar() {
            Some(s) => decode_scalar(text, s),
            None => Err(CodecError::invalid_text(field_type, text, "unsupported type")),
        },
    }
}

/// Decode the individual values of a multi-valued attribute.
///
/// # Errors
///
/// Returns an error if any element fails to decode.
pub fn decode_set<S: AsRef<str>>(values: &[S], elem: ScalarType) -> CodecResult<Value> {
    values
        .iter()
        .map(|v| decode(Some(v.as_ref()), elem.into()))
        .filter(|v| !matches!(v, Ok(Value::Null)))
        .collect::<CodecResult<Vec<_>>>()
        .map(Value::Set)
}

/// Parse the plain decimal text of a native number attribute.
///
/// # Errors
///
/// Returns [`CodecError::NotNumeric`] if `field_type` is not numeric and
/// [`CodecError::InvalidText`] if the text is not a number.
pub fn parse_number(text: &str, field_type: FieldType) -> CodecResult<Value> {
    match field_type.scalar() {
        Some(scalar) if scalar.is_numeric() => decode_scalar(text.trim(), scalar),
        _ => Err(CodecError::NotNumeric {
            kind: field_type.to_string(),
        }),
    }
}

fn decode_scalar(text: &str, scalar: ScalarType) -> CodecResult<Value> {
    match scalar {
        ScalarType::String => Ok(Value::String(text.to_string())),
        ScalarType::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(CodecError::invalid_text(scalar, text, "expected true or false"))
            }
        }
        ScalarType::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(CodecError::invalid_text(scalar, text, "expected one character")),
            }
        }
        ScalarType::Byte => parse(text, scalar).map(Value::Byte),
        ScalarType::Short => parse(text, scalar).map(Value::Short),
        ScalarType::Int => parse(text, scalar).map(Value::Int),
        ScalarType::Long => parse(text, scalar).map(Value::Long),
        ScalarType::Float => parse(text, scalar).map(Value::Float),
        ScalarType::Double => parse(text, scalar).map(Value::Double),
        ScalarType::Timestamp => DateTime::parse_from_rfc3339(text)
            .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|e| CodecError::invalid_text(scalar, text, e)),
    }
}

fn parse<T>(text: &str, scalar: ScalarType) -> CodecResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| CodecError::invalid_text(scalar, text, e))
}
