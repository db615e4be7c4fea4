use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Type tags written before each encoded value
pub const TAG_NULL: u8 = 0;
pub const TAG_INT: u8 = 1;
pub const TAG_FLOAT: u8 = 2;
pub const TAG_STRING: u8 = 3;
pub const TAG_BOOL: u8 = 4;

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Float,
    Bool,
    /// Fixed-width string with a declared length
    Char(usize),
    /// Bounded string with a declared maximum length
    Varchar(usize),
    /// Unbounded string
    Text,
}

impl DataType {
    /// Declared length for bounded string types
    pub fn declared_length(&self) -> Option<usize> {
        match self {
            DataType::Char(n) | DataType::Varchar(n) => Some(*n),
            DataType::Int | DataType::Float | DataType::Bool | DataType::Text => None,
        }
    }

    /// Whether a non-null value has a compatible runtime type
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (DataType::Int, Value::Int(_))
                | (DataType::Float, Value::Float(_))
                | (DataType::Bool, Value::Bool(_))
                | (DataType::Char(_), Value::String(_))
                | (DataType::Varchar(_), Value::String(_))
                | (DataType::Text, Value::String(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INTEGER"),
            DataType::Float => write!(f, "DOUBLE"),
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
            DataType::Text => write!(f, "TEXT"),
        }
    }
}

/// Represents a single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i32),
    Float(f64),
    String(String),
    Bool(bool),
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Tag byte used by the record encoding
    pub fn type_tag(&self) -> u8 {
        match self {
            Value::Null => TAG_NULL,
            Value::Int(_) => TAG_INT,
            Value::Float(_) => TAG_FLOAT,
            Value::String(_) => TAG_STRING,
            Value::Bool(_) => TAG_BOOL,
        }
    }

    /// Encoded size in bytes, tag included
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Value::Null => 0,
            Value::Int(_) => 4,
            Value::Float(_) => 8,
            Value::String(s) => 4 + s.len(),
            Value::Bool(_) => 1,
        }
    }

    /// Key equality for uniqueness checks. Floats compare by bit pattern, so
    /// identical NaNs collide and `-0.0` differs from `0.0`.
    pub fn key_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Ordering for sorting rows by key: NULL first, same types compared
    /// directly, mixed types by their text
    pub fn key_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }

    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "DOUBLE",
            Value::String(_) => "STRING",
            Value::Bool(_) => "BOOLEAN",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
