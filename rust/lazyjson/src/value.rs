use std::{fmt, sync::Arc};

use crate::branch::{LazyObject, LazyList};

/// A materialized scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(Arc<str>),
    Enum { ordinal: usize, name: Arc<str> },
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Byte(_) => "byte",
            Scalar::Short(_) => "short",
            Scalar::Int(_) => "int",
            Scalar::Long(_) => "long",
            Scalar::Float(_) => "float",
            Scalar::Double(_) => "double",
            Scalar::Char(_) => "char",
            Scalar::String(_) => "string",
            Scalar::Enum { .. } => "enum",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral value of any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Byte(v) => Some(v as i64),
            Scalar::Short(v) => Some(v as i64),
            Scalar::Int(v) => Some(v as i64),
            Scalar::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Value of any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Float(v) => Some(v as f64),
            Scalar::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Scalar::Char(c) => Some(*c),
            _ => None,
        }
    }

    /// Text of a string, or the constant name of an enum.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            Scalar::Enum { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Byte(v) => write!(f, "{v}"),
            Scalar::Short(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Long(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Double(v) => write!(f, "{v}"),
            Scalar::Char(c) => write!(f, "{c}"),
            Scalar::String(s) => f.write_str(s),
            Scalar::Enum { name, .. } => f.write_str(name),
        }
    }
}

/// The result of an accessor call.
///
/// Objects and lists are returned as lazy branches: nothing below them is read until
/// one of their own accessors is called.
#[derive(Clone)]
pub enum Value {
    Null,
    Scalar(Scalar),
    Object(LazyObject),
    List(LazyList),
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

    pub fn as_object(&self) -> Option<&LazyObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&LazyList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<LazyObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<LazyList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Scalar::as_bool)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Scalar(s) => s.type_name(),
            Value::Object(_) => "object",
            Value::List(_) => "list",
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Value {
        Value::Scalar(scalar)
    }
}

impl From<Option<Scalar>> for Value {
    fn from(scalar: Option<Scalar>) -> Value {
        scalar.map_or(Value::Null, Value::Scalar)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Scalar(s) => write!(f, "Scalar({s:?})"),
            Value::Object(o) => write!(f, "Object({})", o.schema_name()),
            Value::List(l) => write!(f, "List({}, len={})", l.name(), l.len()),
        }
    }
}
