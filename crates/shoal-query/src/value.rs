use std::fmt;
use std::str::FromStr;

use bson::Bson;
use serde::{Deserialize, Serialize};

/// Declared type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

impl FieldType {
    pub const ALL: [FieldType; 3] = [FieldType::Boolean, FieldType::Number, FieldType::String];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "boolean" => Ok(FieldType::Boolean),
            other => Err(format!("unsupported field type: {other}")),
        }
    }
}

/// A filter literal that could not be read as the field's declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot interpret {literal:?} as {expected}")]
pub struct CoercionError {
    pub literal: String,
    pub expected: FieldType,
}

/// A numeric literal or stored number, kept exact.
///
/// Values are canonical: anything integral that fits an `i64` is `Int`, so
/// `42`, `42.0` and `-0.0` compare and encode alike. `Float` only holds
/// finite values with a fractional part or outside the `i64` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Canonical form of a finite float. Returns `None` for NaN and infinities.
    pub fn from_f64(n: f64) -> Option<Self> {
        if !n.is_finite() {
            return None;
        }
        // 2^63 is exact as an f64; every integral f64 below it fits an i64.
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if n.fract() == 0.0 && (-LIMIT..LIMIT).contains(&n) {
            Some(Number::Int(n as i64))
        } else {
            Some(Number::Float(n))
        }
    }

    fn parse(literal: &str) -> Option<Self> {
        match literal.parse::<i64>() {
            Ok(i) => Some(Number::Int(i)),
            Err(_) => literal.parse::<f64>().ok().and_then(Number::from_f64),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(n) => write!(f, "{n}"),
        }
    }
}

/// A comparison value after resolution against the bucket schema.
///
/// `Untyped` is what a literal stays when its field has no declared type: it
/// can only ever equal a stored string.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Number(Number),
    Boolean(bool),
    Untyped(String),
}

impl TypedValue {
    /// Interpret a filter literal. With no declared type the literal is left untyped.
    pub fn coerce(literal: &str, field_type: Option<FieldType>) -> Result<Self, CoercionError> {
        let err = |expected| CoercionError {
            literal: literal.to_string(),
            expected,
        };
        match field_type {
            None => Ok(TypedValue::Untyped(literal.to_string())),
            Some(FieldType::String) => Ok(TypedValue::String(literal.to_string())),
            Some(FieldType::Number) => Number::parse(literal)
                .map(TypedValue::Number)
                .ok_or_else(|| err(FieldType::Number)),
            Some(FieldType::Boolean) => match literal {
                "true" => Ok(TypedValue::Boolean(true)),
                "false" => Ok(TypedValue::Boolean(false)),
                _ => Err(err(FieldType::Boolean)),
            },
        }
    }

    /// Typed view of a stored value for an index column of `field_type`.
    /// Returns `None` when the stored value is not of that type.
    pub fn from_stored(value: &Bson, field_type: FieldType) -> Option<Self> {
        match (field_type, value) {
            (FieldType::String, Bson::String(s)) => Some(TypedValue::String(s.clone())),
            (FieldType::Number, Bson::Int32(n)) => {
                Some(TypedValue::Number(Number::Int(i64::from(*n))))
            }
            (FieldType::Number, Bson::Int64(n)) => Some(TypedValue::Number(Number::Int(*n))),
            (FieldType::Number, Bson::Double(n)) => Number::from_f64(*n).map(TypedValue::Number),
            (FieldType::Boolean, Bson::Boolean(b)) => Some(TypedValue::Boolean(*b)),
            _ => None,
        }
    }

    /// Equality against a stored raw value.
    pub fn matches(&self, stored: &Bson) -> bool {
        match (self, stored) {
            (TypedValue::String(a), Bson::String(b)) => a == b,
            (TypedValue::Number(a), Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => {
                TypedValue::from_stored(stored, FieldType::Number)
                    .is_some_and(|b| b == TypedValue::Number(*a))
            }
            (TypedValue::Boolean(a), Bson::Boolean(b)) => a == b,
            // An untyped literal is a string; it never equals a stored number or boolean.
            (TypedValue::Untyped(a), Bson::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) | TypedValue::Untyped(s) => f.write_str(s),
            TypedValue::Number(n) => write!(f, "{n}"),
            TypedValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}
