//! Coercion between XSD lexical values and JSON leaves.

use serde_json::{Number, Value};

use crate::resolver::{Content, ResolvedSchema, SimpleVariety, TypeRef};
use crate::xsd::builtins::Primitive;

/// How the text of a simple-typed value maps to data
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Scalar {
    Atomic(Primitive),
    /// Whitespace separated items, represented as an array
    List(Primitive),
    /// Member selection is not attempted; values pass through as text
    Union,
}

pub(super) fn scalar(schema: &ResolvedSchema, type_: TypeRef) -> Scalar {
    match type_ {
        TypeRef::Builtin(builtin) => Scalar::Atomic(builtin.primitive),
        TypeRef::Simple(id) => match &schema.simple_type(id).variety {
            SimpleVariety::Atomic { primitive, .. } => Scalar::Atomic(*primitive),
            SimpleVariety::List { item } => match scalar(schema, *item) {
                Scalar::Atomic(primitive) | Scalar::List(primitive) => Scalar::List(primitive),
                Scalar::Union => Scalar::List(Primitive::String),
            },
            SimpleVariety::Union { .. } => Scalar::Union,
        },
        TypeRef::Complex(id) => match &schema.complex_type(id).content {
            Content::Simple(text) => scalar(schema, *text),
            Content::Empty | Content::Elements(_) => Scalar::Atomic(Primitive::Any),
        },
    }
}

/// Reads the lexical value `text`; `None` if it is not in the lexical space.
pub(super) fn read_scalar(scalar: Scalar, text: &str) -> Option<Value> {
    match scalar {
        Scalar::Atomic(primitive) => read_primitive(primitive, text),
        Scalar::List(primitive) => text
            .split_ascii_whitespace()
            .map(|item| read_primitive(primitive, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Scalar::Union => Some(Value::String(text.to_string())),
    }
}

/// Formats `value` as text of the given shape; `None` if the JSON shape does not fit.
pub(super) fn format_scalar(scalar: Scalar, value: &Value) -> Option<String> {
    match (scalar, value) {
        (Scalar::List(primitive), Value::Array(items)) => items
            .iter()
            .map(|item| format_primitive(primitive, item))
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(" ")),
        (Scalar::Atomic(primitive) | Scalar::List(primitive), value) => {
            format_primitive(primitive, value)
        }
        (Scalar::Union, value) => format_primitive(Primitive::Any, value),
    }
}

pub(super) fn read_primitive(primitive: Primitive, text: &str) -> Option<Value> {
    match primitive {
        Primitive::String | Primitive::Any => Some(Value::String(text.to_string())),
        Primitive::Boolean => read_boolean(text).map(Value::Bool),
        Primitive::Integer => read_integer(text).map(Value::Number),
        Primitive::Decimal => read_decimal(text).map(Value::Number),
    }
}

pub(super) fn format_primitive(primitive: Primitive, value: &Value) -> Option<String> {
    match (primitive, value) {
        (_, Value::Null | Value::Array(_) | Value::Object(_)) => None,

        (Primitive::String | Primitive::Any, Value::String(text)) => Some(text.clone()),
        (Primitive::String | Primitive::Any, other) => Some(other.to_string()),

        (Primitive::Boolean, Value::Bool(flag)) => Some(flag.to_string()),
        (Primitive::Boolean, Value::String(text)) => read_boolean(text).map(|f| f.to_string()),

        (Primitive::Integer, Value::Number(number)) if number.is_i64() || number.is_u64() => {
            Some(number.to_string())
        }
        (Primitive::Integer, Value::String(text)) => read_integer(text).map(|n| n.to_string()),

        (Primitive::Decimal, Value::Number(number)) => Some(number.to_string()),
        (Primitive::Decimal, Value::String(text)) => read_decimal(text).map(|n| n.to_string()),

        (Primitive::Boolean | Primitive::Integer | Primitive::Decimal, _) => None,
    }
}

fn read_boolean(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn read_integer(text: &str) -> Option<Number> {
    let text = text.trim();
    text.parse::<i64>()
        .map(Number::from)
        .or_else(|_| text.parse::<u64>().map(Number::from))
        .ok()
}

fn read_decimal(text: &str) -> Option<Number> {
    let text = text.trim();
    if !text.contains(['.', 'e', 'E']) {
        if let Some(integer) = read_integer(text) {
            return Some(integer);
        }
    }
    // INF and NaN have no JSON representation
    text.parse::<f64>().ok().and_then(Number::from_f64)
}
