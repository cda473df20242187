//! Filter conditions.
//!
//! A condition binds an operator and its operands to one entity field. It
//! is validated when it is built, against both the schema and the backend
//! it will run on, so an invalid filter never reaches the network.

use crate::backend::BackendKind;
use crate::error::{CoreError, CoreResult};
use crate::schema::{EntitySchema, FieldDescriptor};
use dualdb_codec::{is_encodable, FieldType, Value};
use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field is absent.
    IsNull,
    /// Field is present.
    NotNull,
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than or equal.
    Le,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Greater than.
    Gt,
    /// Pattern match, `%` matching any run of characters.
    Like,
    /// Negated pattern match.
    NotLike,
    /// Substring of a text field, or member of a set field.
    Contains,
    /// Negated `Contains`.
    NotContains,
    /// Text prefix.
    BeginsWith,
    /// Inclusive range.
    Between,
    /// Equal to one of several values.
    In,
}

/// Number of operands an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// No operand.
    Unary,
    /// One operand.
    Binary,
    /// Two operands.
    Ternary,
    /// One or more operands.
    List,
}

impl Operator {
    /// Returns the operand count class.
    pub const fn arity(self) -> Arity {
        match self {
            Self::IsNull | Self::NotNull => Arity::Unary,
            Self::Between => Arity::Ternary,
            Self::In => Arity::List,
            _ => Arity::Binary,
        }
    }

    /// Returns true for the ordering comparisons.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Le | Self::Lt | Self::Ge | Self::Gt
        )
    }

    /// Returns true for operators that only make sense on text.
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Like | Self::NotLike | Self::BeginsWith)
    }

    /// Short name used in messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IsNull => "is null",
            Self::NotNull => "is not null",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Le => "<=",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::Contains => "contains",
            Self::NotContains => "not contains",
            Self::BeginsWith => "begins with",
            Self::Between => "between",
            Self::In => "in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    operator: Operator,
    operands: Vec<Value>,
}

impl Condition {
    /// Validates and builds a condition.
    ///
    /// Operands are coerced to the field type, or to the element type for
    /// set fields.
    ///
    /// # Errors
    ///
    /// - validation error: unknown field, structured field, wrong operand
    ///   count, null operand, operator that does not apply to the field type
    /// - [`CoreError::UnsupportedOperation`]: the backend lacks the operator
    /// - codec error: an operand does not fit the field type
    pub fn new(
        schema: &EntitySchema,
        backend: BackendKind,
        field: &str,
        operator: Operator,
        operands: Vec<Value>,
    ) -> CoreResult<Self> {
        let descriptor = schema.require_field(field)?;
        let field_type = descriptor.field_type();

        if !is_encodable(field_type) {
            return Err(CoreError::validation(format!(
                "{field} holds structured data and cannot be filtered"
            )));
        }
        if !backend.supports(operator, descriptor) {
            return Err(CoreError::unsupported(format!(
                "{backend} backend does not support '{operator}' on {field}"
            )));
        }
        check_applicable(descriptor, operator)?;
        check_arity(field, operator, operands.len())?;

        let operand_type = match field_type {
            FieldType::Set(elem) => elem.into(),
            other => other,
        };
        let operands = operands
            .into_iter()
            .map(|value| {
                if value.is_null() {
                    return Err(CoreError::validation(format!(
                        "null operand for '{operator}' on {field}; use is null instead"
                    )));
                }
                Ok(value.coerce(operand_type)?)
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Self {
            field: field.to_string(),
            operator,
            operands,
        })
    }

    /// Field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Operands, already coerced.
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// The single operand of a binary operator.
    pub fn operand(&self) -> Option<&Value> {
        self.operands.first()
    }
}

fn check_applicable(field: &FieldDescriptor, operator: Operator) -> CoreResult<()> {
    let field_type = field.field_type();
    let ok = match operator {
        Operator::IsNull | Operator::NotNull => true,
        Operator::Contains | Operator::NotContains => {
            field_type == FieldType::String || field_type.is_set()
        }
        op if op.is_textual() => field_type == FieldType::String,
        _ => !field_type.is_set(),
    };
    if ok {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "'{operator}' does not apply to {} field {}",
            field_type,
            field.name()
        )))
    }
}

fn check_arity(field: &str, operator: Operator, count: usize) -> CoreResult<()> {
    let ok = match operator.arity() {
        Arity::Unary => count == 0,
        Arity::Binary => count == 1,
        Arity::Ternary => count == 2,
        Arity::List => count >= 1,
    };
    if ok {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "'{operator}' on {field} takes {:?} operands, got {count}",
            operator.arity()
        )))
    }
}
