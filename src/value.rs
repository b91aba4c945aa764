//! Wire-level values bound to statement placeholders and read back from rows.
//!
//! `Value` is the converted, column-ready form of a record property. Nested
//! UDT values are `Composite`, keyed by field name in declared order, so
//! conversion recurses without any dynamic type checks.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A single primitive CQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Blob(Vec<u8>),
}

impl Scalar {
    /// CQL type name, used in conversion diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Blob(_) => "blob",
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(v)
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(Scalar::$variant(v))
                }
            }
        )*
    };
}

scalar_from! {
    bool => Boolean,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    Decimal => Decimal,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    Vec<u8> => Blob,
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Text(v.to_string()))
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::Scalar(v)
    }
}

/// Converted column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Scalar(Scalar),
    /// UDT value: `(field name, value)` pairs in declared order.
    Composite(Vec<(String, Value)>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Field of a composite value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Composite(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Scalar(s) => s.type_name(),
            Value::Composite(_) => "udt",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

/// Typed extraction from a `Value`.
///
/// Integer and float kinds widen (`int` reads as `i64`, `float` as `f64`);
/// anything else must match exactly.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {expected}, found {}", got.kind())
}

macro_rules! from_value_exact {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::Scalar(Scalar::$variant(v)) => Ok(v),
                        other => Err(mismatch($name, &other)),
                    }
                }
            }
        )*
    };
}

from_value_exact! {
    bool => Boolean, "boolean";
    i32 => Int, "int";
    f32 => Float, "float";
    Decimal => Decimal, "decimal";
    String => Text, "text";
    Uuid => Uuid, "uuid";
    DateTime<Utc> => Timestamp, "timestamp";
    NaiveDate => Date, "date";
    Vec<u8> => Blob, "blob";
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Scalar(Scalar::BigInt(v)) => Ok(v),
            Value::Scalar(Scalar::Int(v)) => Ok(i64::from(v)),
            other => Err(mismatch("bigint", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Scalar(Scalar::Double(v)) => Ok(v),
            Value::Scalar(Scalar::Float(v)) => Ok(f64::from(v)),
            other => Err(mismatch("double", &other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

/// Reads a `list`/`set` value element by element.
pub fn list_from_value<T: FromValue>(value: Value) -> Result<Vec<T>, String> {
    match value {
        Value::List(items) => items.into_iter().map(T::from_value).collect(),
        other => Err(mismatch("list", &other)),
    }
}

/// Reads a `map` value entry by entry, in wire order.
pub fn map_from_value<K: FromValue, V: FromValue>(value: Value) -> Result<Vec<(K, V)>, String> {
    match value {
        Value::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect(),
        other => Err(mismatch("map", &other)),
    }
}
